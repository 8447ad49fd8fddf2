//! Reliable UDP transport with a handshake, per-message reliable/unreliable
//! delivery, and passive keep-alive, built on `tokio`.
//!
//! This crate is the async/socket half of the split: [`reliant_proto`]
//! encodes the wire protocol and tracks per-peer reliability/keep-alive state
//! without any knowledge of sockets or async; this crate drives that state
//! machine against a real `tokio::net::UdpSocket`.
//!
//! Module map:
//! - [`connection`] — [`Connection`], the client-side handle, and its
//!   backing actor task.
//! - [`listener`] — [`Listener`], the server-side socket multiplexing many
//!   peers by remote address.
//! - `peer` (private) — the dispatcher shared by both: turns datagrams and
//!   timer ticks into actions against one peer's reliability/keep-alive
//!   state.
//! - [`discovery`] — passive LAN broadcast discovery, independent of
//!   connection state.
//! - [`callbacks`] — the application callback slots.
//! - [`config`] — typed, `Default`-backed tunables.
//! - [`state`] — the connection lifecycle state machine.
//! - [`error`] — the unified connection error taxonomy.

#![warn(missing_docs)]

pub mod callbacks;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod listener;
mod peer;
pub mod state;
mod util;

pub use callbacks::{Callbacks, DisconnectReason, ListenerCallbacks};
pub use config::{ConnectionConfig, ListenerConfig};
pub use connection::Connection;
pub use discovery::{Broadcaster, DiscoveryListener};
pub use error::ConnectionError;
pub use listener::Listener;
pub use state::ConnectionState;

pub use reliant_proto::{Buffer, SendOption};
