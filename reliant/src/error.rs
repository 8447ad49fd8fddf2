//! See [`ConnectionError`].

use thiserror::Error;

/// Everything that can end a connection or fail to start one.
///
/// The internal-disconnect variants (from
/// [`socket_send_failure`](ConnectionError::SocketSend) through
/// [`connection_disconnected`](ConnectionError::ConnectionDisconnected)) are
/// what gets passed to a registered `on_internal_disconnect` callback; the
/// handshake variants are returned directly from [`connect`](crate::Connection::connect).
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// `send_to` on the underlying socket failed.
    #[error("failed to send on socket: {0}")]
    SocketSend(#[source] std::io::Error),

    /// `recv_from` on the underlying socket failed.
    #[error("failed to receive on socket: {0}")]
    SocketReceive(#[source] std::io::Error),

    /// The socket reported a zero-length datagram, treated the same as a
    /// half-closed or reset peer.
    #[error("received a zero-length datagram")]
    ZeroBytesReceived,

    /// The keep-alive engine gave up after too many consecutive unanswered
    /// pings.
    #[error("peer did not respond to keep-alive pings")]
    PingsWithoutResponse,

    /// A reliable packet was retransmitted past its retry budget without
    /// ever being acknowledged.
    #[error("reliable packet was never acknowledged")]
    ReliablePacketWithoutResponse,

    /// Catch-all for a connection that was torn down by its own internal
    /// state, distinct from a local or remote graceful disconnect.
    #[error("connection was disconnected")]
    ConnectionDisconnected,

    /// `connect` did not complete (hello acknowledged) before the caller's
    /// deadline elapsed.
    #[error("handshake did not complete before the deadline")]
    HandshakeTimeout,

    /// The remote end sent a disconnect datagram before the handshake
    /// completed, e.g. an admission rejection.
    #[error("remote closed the connection during the handshake")]
    RemoteDisconnectedDuringHandshake,

    /// An operation was given a combination of arguments the protocol does
    /// not allow, e.g. a reliable disconnect payload.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
