//! Errors produced while encoding or decoding wire data.

use thiserror::Error;

/// Failure while reading from or writing to a [`Buffer`](crate::buffer::Buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Attempted to read more bytes than the buffer had remaining, or to
    /// write more bytes than the buffer's fixed view allowed.
    #[error("buffer too short")]
    BufferTooShort,
    /// A packed integer did not terminate within [`crate::varint::MAX_LEN`]
    /// bytes.
    #[error("varint too large")]
    VarintTooLarge,
    /// Attempted to write into a view buffer, which is read-only.
    #[error("cannot write into a read-only view buffer")]
    ViewIsReadOnly,
    /// Attempted to `end_message` or `cancel_message` with no matching
    /// `start_message` on the stack.
    #[error("no open message to end or cancel")]
    NoOpenMessage,
    /// Decoded string bytes were not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,
    /// Rented a pool slot whose generation no longer matches (it was already
    /// returned and reused).
    #[error("stale buffer handle, slot has been recycled")]
    StaleHandle,
}

/// Result alias for buffer operations.
pub type Result<T> = std::result::Result<T, BufferError>;
