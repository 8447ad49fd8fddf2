//! Sans-IO wire protocol for `reliant`.
//!
//! This crate has no knowledge of sockets, async runtimes, or wall-clock
//! time beyond [`std::time::Instant`]; it only encodes and decodes bytes and
//! tracks per-peer protocol state. The `reliant` crate drives this state
//! machine against a real `tokio` UDP socket.
//!
//! Module map:
//! - [`buffer`] — the framing buffer: nested length-tagged messages, typed
//!   primitive reads/writes, pooled reuse.
//! - [`varint`] — packed (variable-length) 32-bit integer encoding.
//! - [`header`] — the one-byte send-option wire tag.
//! - [`seq`] — [`seq::ReliableId`], the wraparound-aware 16-bit id.
//! - [`novelty`] — classifies inbound ids as new, recovered, or duplicate.
//! - [`ack`] — the cumulative + recent-bitmask acknowledgement frame.
//! - [`reliability`] — ties the above together: allocation, retransmission,
//!   RTT estimation.
//! - [`keepalive`] — liveness probing on top of the reliability engine.
//! - [`pool`] — a generation-checked free-list of pooled [`buffer::Buffer`]s.

#![warn(missing_docs)]

pub mod ack;
pub mod buffer;
pub mod error;
pub mod header;
pub mod keepalive;
pub mod novelty;
pub mod pool;
pub mod reliability;
pub mod seq;
pub mod varint;

pub use ack::Acknowledge;
pub use buffer::Buffer;
pub use error::BufferError;
pub use header::SendOption;
pub use keepalive::{KeepAliveConfig, KeepAliveEngine};
pub use novelty::{Novelty, NoveltyTracker};
pub use reliability::{ReliabilityConfig, ReliabilityEngine, RetransmitEvent};
pub use seq::ReliableId;
