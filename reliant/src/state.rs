//! See [`ConnectionState`].

/// Where a connection is in its lifecycle.
///
/// `NotConnected` is terminal: once reached, a [`Connection`](crate::Connection)
/// cannot be reused to connect again. Valid transitions are
/// `NotConnected -> Connecting -> Connected -> NotConnected`, plus a direct
/// `Connecting -> NotConnected` on handshake failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handshake has been attempted, or one has already finished
    /// (successfully or not).
    NotConnected,
    /// A hello has been sent and we're waiting for it to be acknowledged.
    Connecting,
    /// The handshake completed; application messages may be sent and
    /// received.
    Connected,
}

impl ConnectionState {
    /// Whether `send`/`send_bytes` are currently permitted.
    #[must_use]
    pub const fn can_send(self) -> bool {
        matches!(self, Self::Connected)
    }
}
