//! See [`PeerState`].
//!
//! This module is the bridge between `reliant_proto`'s sans-IO primitives
//! and actual callback/socket I/O: it owns one peer's reliability and
//! keep-alive engines and turns inbound datagrams into a list of
//! [`PeerAction`]s, which the connection or listener event loop then carries
//! out against a real socket and the registered [`Callbacks`](crate::callbacks::Callbacks).
//! Both [`crate::Connection`] (client) and [`crate::Listener`] (server) drive
//! the same dispatcher here, so the protocol logic is written once.

use std::{net::SocketAddr, time::Instant};

use reliant_proto::{
    Acknowledge, Buffer, Novelty, ReliabilityEngine, ReliableId, RetransmitEvent, SendOption,
};

use crate::{callbacks::DisconnectReason, config::ConnectionConfig, error::ConnectionError, state::ConnectionState};
use reliant_proto::KeepAliveEngine;

/// One outcome of dispatching a datagram or a timer tick against a
/// [`PeerState`]. A single call can produce several (e.g. an inbound
/// reliable packet produces both an ack to send and a payload to deliver).
pub(crate) enum PeerAction {
    /// Transmit these raw bytes to the peer. A failed send here is fatal to
    /// the connection (converted to an internal disconnect).
    Send(Vec<u8>),
    /// Transmit an acknowledgement. A failed send here is swallowed (logged,
    /// not fatal) since the peer will simply retransmit and get acked again.
    SendAck(Vec<u8>),
    /// Hand this payload to the application.
    Deliver(Buffer, SendOption),
    /// An inbound ack was just processed; the caller should restart its idle
    /// keep-alive timer.
    KeepAliveReset,
    /// The connection has ended; report it and stop.
    Disconnected(Option<Buffer>, DisconnectReason),
    /// An internal failure occurred; the caller decides whether to send a
    /// farewell (via `on_internal_disconnect`) before tearing down.
    InternalDisconnect(ConnectionError),
    /// The pending hello was just acknowledged; `Connecting -> Connected`.
    HandshakeComplete,
}

/// Protocol state for exactly one remote peer: its reliability engine,
/// keep-alive engine, and connection state.
pub(crate) struct PeerState {
    pub(crate) remote_addr: SocketAddr,
    pub(crate) reliability: ReliabilityEngine,
    pub(crate) keep_alive: KeepAliveEngine,
    pub(crate) state: ConnectionState,
    pending_hello_id: Option<ReliableId>,
}

impl PeerState {
    pub(crate) fn new(remote_addr: SocketAddr, config: ConnectionConfig, initial_state: ConnectionState) -> Self {
        Self {
            remote_addr,
            reliability: ReliabilityEngine::new(config.to_reliability_config()),
            keep_alive: KeepAliveEngine::new(config.to_keep_alive_config()),
            state: initial_state,
            pending_hello_id: None,
        }
    }

    /// Builds the hello packet for a client-initiated handshake and begins
    /// tracking it for retransmission.
    pub(crate) fn build_hello(&mut self, payload: &[u8]) -> Vec<u8> {
        let mut buf = Buffer::with_send_option(SendOption::Hello, 4 + payload.len());
        buf.write_u8(0).expect("fresh buffer has capacity");
        buf.write_bytes(payload).expect("fresh buffer has capacity");
        let id = self.reliability.allocate_id();
        buf.set_reliable_id(id)
            .expect("hello buffer carries a reliable id");
        self.pending_hello_id = Some(id);
        let bytes = buf.as_bytes().to_vec();
        self.reliability.track_outbound(id, bytes.clone(), Instant::now());
        bytes
    }

    /// Stamps a reliable id into `buf` (which must carry
    /// [`SendOption::Reliable`]) and begins tracking it for retransmission.
    pub(crate) fn build_reliable(&mut self, mut buf: Buffer) -> Vec<u8> {
        let id = self.reliability.allocate_id();
        buf.set_reliable_id(id)
            .expect("caller passed a buffer with a reliable send option");
        let bytes = buf.as_bytes().to_vec();
        self.reliability.track_outbound(id, bytes.clone(), Instant::now());
        bytes
    }

    /// Builds a graceful disconnect datagram; never tracked for
    /// retransmission.
    pub(crate) fn build_disconnect(payload: Option<&[u8]>) -> Vec<u8> {
        let len = payload.map_or(0, <[u8]>::len);
        let mut buf = Buffer::with_send_option(SendOption::Disconnect, 1 + len);
        if let Some(payload) = payload {
            buf.write_bytes(payload)
                .expect("fresh buffer has capacity");
        }
        buf.as_bytes().to_vec()
    }

    /// Dispatches one inbound datagram, per the wire format's send-option
    /// tag, producing zero or more actions for the caller to carry out.
    pub(crate) fn handle_datagram(&mut self, bytes: &[u8]) -> Vec<PeerAction> {
        let Some(&tag) = bytes.first() else {
            return Vec::new();
        };

        if tag == SendOption::Ack.tag() {
            let Some(ack) = Acknowledge::decode(&bytes[1..]) else {
                return Vec::new();
            };
            let completes_handshake = self.pending_hello_id == Some(ack.id)
                || ack.acked_ids().any(|id| Some(id) == self.pending_hello_id);
            self.reliability.handle_ack(ack, Instant::now());
            self.keep_alive.on_ack();

            let mut actions = vec![PeerAction::KeepAliveReset];
            if completes_handshake && self.state == ConnectionState::Connecting {
                self.state = ConnectionState::Connected;
                self.pending_hello_id = None;
                actions.push(PeerAction::HandshakeComplete);
            }
            return actions;
        }

        if tag == SendOption::Disconnect.tag() {
            let payload = (bytes.len() > 1).then(|| Buffer::from_bytes(&bytes[1..]));
            return vec![PeerAction::Disconnected(payload, DisconnectReason::Remote)];
        }

        if tag == SendOption::Reliable.tag() || tag == SendOption::Hello.tag() || tag == SendOption::Ping.tag() {
            let mut header = Buffer::from_bytes(bytes);
            let _ = header.read_u8();
            let Ok(id_raw) = header.read_u16_be() else {
                return Vec::new();
            };
            let id = ReliableId(id_raw);
            let (novelty, ack) = self.reliability.handle_inbound(id);

            let mut actions = vec![PeerAction::SendAck(ack.encode().to_vec())];
            if matches!(novelty, Novelty::New | Novelty::Recovered) && tag == SendOption::Reliable.tag() {
                actions.push(PeerAction::Deliver(
                    Buffer::from_bytes(&bytes[3..]),
                    SendOption::Reliable,
                ));
            }
            return actions;
        }

        if tag == SendOption::Fragment.tag() {
            return vec![PeerAction::Deliver(
                Buffer::from_bytes(&bytes[1..]),
                SendOption::Unreliable,
            )];
        }

        vec![PeerAction::Deliver(
            Buffer::from_bytes(&bytes[1..]),
            SendOption::Unreliable,
        )]
    }

    /// Runs one retransmission pass, translating `reliant_proto`'s
    /// [`RetransmitEvent`]s into actions.
    pub(crate) fn retransmit_tick(&mut self, now: Instant) -> Vec<PeerAction> {
        self.reliability
            .retransmit_tick(now)
            .into_iter()
            .map(|event| match event {
                RetransmitEvent::Resend(bytes) => PeerAction::Send(bytes),
                RetransmitEvent::GiveUp => {
                    PeerAction::InternalDisconnect(ConnectionError::ReliablePacketWithoutResponse)
                }
            })
            .collect()
    }

    /// Runs one keep-alive tick: sends a ping, or gives up if the peer has
    /// missed too many in a row.
    pub(crate) fn keep_alive_tick(&mut self) -> Vec<PeerAction> {
        if self.state != ConnectionState::Connected {
            return Vec::new();
        }
        if self.keep_alive.should_disconnect() {
            return vec![PeerAction::InternalDisconnect(ConnectionError::PingsWithoutResponse)];
        }

        let mut buf = Buffer::with_send_option(SendOption::Ping, 3);
        let id = self.reliability.allocate_id();
        buf.set_reliable_id(id)
            .expect("ping buffer carries a reliable id");
        let bytes = buf.as_bytes().to_vec();
        self.reliability.track_outbound(id, bytes.clone(), Instant::now());
        self.keep_alive.record_ping_sent();
        vec![PeerAction::Send(bytes)]
    }

    /// Clears reliability and keep-alive state, as on connection close.
    pub(crate) fn reset(&mut self) {
        self.reliability.reset();
        self.keep_alive.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerState {
        PeerState::new(
            "127.0.0.1:9000".parse().unwrap(),
            ConnectionConfig::default(),
            ConnectionState::Connecting,
        )
    }

    #[test]
    fn hello_ack_completes_handshake() {
        let mut p = peer();
        let hello = p.build_hello(b"hi");
        assert_eq!(hello[0], SendOption::Hello.tag());

        let ack = Acknowledge {
            id: ReliableId(0),
            recent_mask: 0,
        };
        let actions = p.handle_datagram(&ack.encode());
        assert!(matches!(
            actions.as_slice(),
            [PeerAction::KeepAliveReset, PeerAction::HandshakeComplete]
        ));
        assert_eq!(p.state, ConnectionState::Connected);
    }

    #[test]
    fn inbound_reliable_acks_and_delivers() {
        let mut p = peer();
        p.state = ConnectionState::Connected;
        let mut inbound = Buffer::with_send_option(SendOption::Reliable, 8);
        inbound.set_reliable_id(ReliableId(0)).unwrap();
        inbound.write_bytes(b"payload").unwrap();

        let actions = p.handle_datagram(inbound.as_bytes());
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0], PeerAction::SendAck(_)));
        assert!(matches!(&actions[1], PeerAction::Deliver(buf, SendOption::Reliable) if buf.as_bytes() == b"payload"));
    }

    #[test]
    fn duplicate_reliable_only_acks_no_deliver() {
        let mut p = peer();
        p.state = ConnectionState::Connected;
        let mut inbound = Buffer::with_send_option(SendOption::Reliable, 8);
        inbound.set_reliable_id(ReliableId(0)).unwrap();
        let bytes = inbound.as_bytes().to_vec();

        p.handle_datagram(&bytes);
        let actions = p.handle_datagram(&bytes);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], PeerAction::SendAck(_)));
    }

    #[test]
    fn unreliable_delivers_without_ack() {
        let mut p = peer();
        let mut inbound = Buffer::with_send_option(SendOption::Unreliable, 8);
        inbound.write_bytes(b"hi").unwrap();
        let actions = p.handle_datagram(inbound.as_bytes());
        assert!(matches!(&actions[..], [PeerAction::Deliver(buf, SendOption::Unreliable)] if buf.as_bytes() == b"hi"));
    }
}
