//! Single-slot application callbacks, set via a builder before
//! [`connect`](crate::Connection::connect) or [`bind`](crate::Listener::bind).
//!
//! Each slot is a boxed closure assigned once and invoked from the
//! connection's (or listener's) event-loop task; there is no dynamic
//! dispatch table, matching how a single reactor drives one logical
//! connection (see the crate-level docs on the concurrency model).

use std::net::SocketAddr;

use reliant_proto::{Buffer, SendOption};

use crate::error::ConnectionError;

/// Why a connection ended, passed to [`Callbacks::on_disconnected`].
#[derive(Debug)]
pub enum DisconnectReason {
    /// The local side called `disconnect`.
    Local,
    /// The remote side sent a disconnect datagram.
    Remote,
    /// An internal failure tore the connection down; see
    /// [`ConnectionError`].
    Internal(ConnectionError),
}

/// Called for every application payload delivered to this connection: a
/// reliable message once novel, or any unreliable message.
pub type DataCallback = Box<dyn FnMut(SocketAddr, Buffer, SendOption) + Send>;

/// Called once when the connection ends, with an optional farewell payload
/// carried on the disconnect datagram.
pub type DisconnectedCallback = Box<dyn FnMut(Option<Buffer>, DisconnectReason) + Send>;

/// Called when an internal failure is about to tear the connection down;
/// may return a farewell payload to send before closing.
pub type InternalDisconnectCallback = Box<dyn FnMut(&ConnectionError) -> Option<Buffer> + Send>;

/// Called on a server listener when a new peer's handshake has been
/// admitted, with that peer's address and handshake payload.
pub type NewConnectionCallback = Box<dyn FnMut(SocketAddr, Buffer) + Send>;

/// Called on a server listener for every inbound hello from an unknown
/// address, before a connection is created for it. Returning `Some(payload)`
/// rejects the peer, sending `payload` back and dropping the attempt;
/// returning `None` admits it.
pub type ConnectionInitCallback = Box<dyn FnMut(SocketAddr, &[u8]) -> Option<Buffer> + Send>;

/// The callback slots a [`Connection`](crate::Connection) invokes over its
/// lifetime. Every slot defaults to doing nothing.
#[derive(Default)]
pub struct Callbacks {
    pub(crate) on_data_received: Option<DataCallback>,
    pub(crate) on_disconnected: Option<DisconnectedCallback>,
    pub(crate) on_internal_disconnect: Option<InternalDisconnectCallback>,
}

impl Callbacks {
    /// Registers the data-received callback.
    pub fn on_data_received(mut self, f: DataCallback) -> Self {
        self.on_data_received = Some(f);
        self
    }

    /// Registers the disconnected callback.
    pub fn on_disconnected(mut self, f: DisconnectedCallback) -> Self {
        self.on_disconnected = Some(f);
        self
    }

    /// Registers the internal-disconnect callback.
    pub fn on_internal_disconnect(mut self, f: InternalDisconnectCallback) -> Self {
        self.on_internal_disconnect = Some(f);
        self
    }
}

/// The callback slots a [`Listener`](crate::Listener) invokes over its
/// lifetime, in addition to each accepted peer's own [`Callbacks`].
#[derive(Default)]
pub struct ListenerCallbacks {
    pub(crate) on_new_connection: Option<NewConnectionCallback>,
    pub(crate) on_connection_init: Option<ConnectionInitCallback>,
}

impl ListenerCallbacks {
    /// Registers the new-connection callback.
    pub fn on_new_connection(mut self, f: NewConnectionCallback) -> Self {
        self.on_new_connection = Some(f);
        self
    }

    /// Registers the admission-gate callback.
    pub fn on_connection_init(mut self, f: ConnectionInitCallback) -> Self {
        self.on_connection_init = Some(f);
        self
    }
}
