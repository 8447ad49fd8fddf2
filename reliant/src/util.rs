//! Small internal helpers shared by the connection and listener event loops.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

/// Runs an application callback, catching a panic so one misbehaving
/// callback can't take down the event loop task it's called from.
///
/// A caught panic is logged at `error` and treated as if the callback had
/// simply returned its default/no-op outcome for this invocation.
pub(crate) fn guard_callback<R: Default>(label: &'static str, f: impl FnOnce() -> R) -> R {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error!(callback = label, "callback panicked, treating as a no-op");
            R::default()
        }
    }
}
