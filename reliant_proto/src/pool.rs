//! See [`BufferPool`].

use slotmap::{new_key_type, SlotMap};

use crate::{buffer::Buffer, header::SendOption};

new_key_type! {
    /// A handle to a buffer rented from a [`BufferPool`].
    ///
    /// Keys are generation-checked by [`slotmap`]: once a handle is
    /// returned via [`BufferPool::release`], using that same handle again
    /// is a no-op rather than reaching into a slot some other caller has
    /// since rented.
    pub struct BufferHandle;
}

/// A free-list of framing [`Buffer`]s, so a connection under steady traffic
/// doesn't reallocate a fresh `Vec<u8>` for every outbound packet.
///
/// Rented buffers live in a [`SlotMap`] so double-releasing the same handle,
/// or releasing a handle whose slot has already been recycled, is a no-op
/// instead of a panic or a use-after-free.
pub struct BufferPool {
    checked_out: SlotMap<BufferHandle, Buffer>,
    idle: Vec<Buffer>,
    default_capacity: usize,
}

impl BufferPool {
    /// Creates an empty pool. `default_capacity` sizes newly allocated
    /// buffers when the idle list is empty.
    #[must_use]
    pub fn new(default_capacity: usize) -> Self {
        Self {
            checked_out: SlotMap::with_key(),
            idle: Vec::new(),
            default_capacity,
        }
    }

    /// Rents a buffer, reusing an idle one if available, resetting it to
    /// `option`'s wire header.
    pub fn rent(&mut self, option: SendOption) -> BufferHandle {
        let mut buf = self
            .idle
            .pop()
            .unwrap_or_else(|| Buffer::empty(self.default_capacity));
        buf.reset(option);
        self.checked_out.insert(buf)
    }

    /// Borrows the buffer behind `handle`, if it's still checked out.
    #[must_use]
    pub fn get(&self, handle: BufferHandle) -> Option<&Buffer> {
        self.checked_out.get(handle)
    }

    /// Mutably borrows the buffer behind `handle`, if it's still checked
    /// out.
    pub fn get_mut(&mut self, handle: BufferHandle) -> Option<&mut Buffer> {
        self.checked_out.get_mut(handle)
    }

    /// Returns a rented buffer to the idle list. A no-op if `handle` does
    /// not name a currently checked-out slot (already released, or stale).
    pub fn release(&mut self, handle: BufferHandle) {
        if let Some(buf) = self.checked_out.remove(handle) {
            self.idle.push(buf);
        }
    }

    /// Number of buffers currently rented out.
    #[must_use]
    pub fn checked_out_count(&self) -> usize {
        self.checked_out.len()
    }

    /// Number of buffers sitting idle, ready to be rented without
    /// allocating.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rent_and_release_recycles_storage() {
        let mut pool = BufferPool::new(64);
        let handle = pool.rent(SendOption::Reliable);
        assert_eq!(pool.checked_out_count(), 1);

        pool.release(handle);
        assert_eq!(pool.checked_out_count(), 0);
        assert_eq!(pool.idle_count(), 1);

        let _ = pool.rent(SendOption::Unreliable);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn double_release_is_a_no_op() {
        let mut pool = BufferPool::new(64);
        let handle = pool.rent(SendOption::Reliable);
        pool.release(handle);
        pool.release(handle);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn stale_handle_cannot_reach_a_recycled_slot() {
        let mut pool = BufferPool::new(64);
        let first = pool.rent(SendOption::Reliable);
        pool.release(first);
        let second = pool.rent(SendOption::Reliable);

        // `first`'s generation no longer matches the slot `second` now
        // occupies, even though the slot may have been reused internally.
        assert!(pool.get(first).is_none());
        assert!(pool.get(second).is_some());
    }
}
