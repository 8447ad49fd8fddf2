//! See [`Listener`].

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use reliant_proto::{Buffer, SendOption};
use tokio::{
    net::UdpSocket,
    sync::{mpsc, oneshot},
};
use tracing::{debug, info, warn};

use crate::{
    callbacks::{Callbacks, ListenerCallbacks},
    config::ListenerConfig,
    connection::{Actor, Command},
    error::ConnectionError,
    peer::PeerState,
    state::ConnectionState,
    util::guard_callback,
};

type PeerMap = Arc<Mutex<HashMap<SocketAddr, mpsc::UnboundedSender<Command>>>>;

/// A server-side socket multiplexing many peer connections by remote
/// address.
///
/// Construct one with [`Listener::bind`]. One shared `tokio::net::UdpSocket`
/// is owned by a dedicated receive task, which demultiplexes each datagram to
/// a per-peer [`Actor`] (the same dispatcher [`crate::Connection`] uses) by
/// looking up the sender's address; an unrecognized address is only accepted
/// if it carries a well-formed hello and passes the admission gate.
pub struct Listener {
    local_addr: SocketAddr,
    peers: PeerMap,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl Listener {
    /// Binds a UDP socket at `local_addr` and starts accepting peers.
    ///
    /// `callbacks` fires for admission gating (`on_connection_init`) and once
    /// per newly accepted peer (`on_new_connection`). `per_peer_callbacks` is
    /// invoked once per accepted peer to build that peer's own
    /// [`Callbacks`], mirroring how [`crate::Connection::connect`] takes a
    /// single `Callbacks` value.
    pub async fn bind(
        local_addr: SocketAddr,
        config: ListenerConfig,
        callbacks: ListenerCallbacks,
        per_peer_callbacks: impl Fn() -> Callbacks + Send + 'static,
    ) -> Result<Self, ConnectionError> {
        let socket = UdpSocket::bind(local_addr)
            .await
            .map_err(ConnectionError::SocketSend)?;
        let local_addr = socket.local_addr().map_err(ConnectionError::SocketSend)?;
        let socket = Arc::new(socket);
        let peers: PeerMap = Arc::new(Mutex::new(HashMap::new()));
        let (stop_tx, stop_rx) = oneshot::channel();

        let task = ListenerTask {
            local_addr,
            socket,
            config,
            callbacks,
            per_peer_callbacks: Box::new(per_peer_callbacks),
            peers: Arc::clone(&peers),
        };
        tokio::spawn(task.run(stop_rx));

        info!(%local_addr, "listener started");
        Ok(Self {
            local_addr,
            peers,
            stop_tx: Some(stop_tx),
        })
    }

    /// The address this listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The remote addresses of currently tracked peers. A peer that has just
    /// disconnected may linger here until the next inbound datagram triggers
    /// lazy cleanup.
    #[must_use]
    pub fn peer_addrs(&self) -> Vec<SocketAddr> {
        self.peers
            .lock()
            .expect("listener peer map mutex poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// Sends `buffer` to an accepted peer using the send option it was
    /// constructed with.
    pub fn send_to(&self, remote: SocketAddr, buffer: Buffer) -> Result<(), ConnectionError> {
        self.dispatch(remote, Command::Send(buffer))
    }

    /// Frames `bytes` with a one-byte header for `option` and sends them to
    /// an accepted peer.
    pub fn send_bytes_to(
        &self,
        remote: SocketAddr,
        bytes: Vec<u8>,
        option: SendOption,
    ) -> Result<(), ConnectionError> {
        self.dispatch(remote, Command::SendBytes(bytes, option))
    }

    /// Gracefully disconnects a single accepted peer.
    pub fn disconnect_peer(
        &self,
        remote: SocketAddr,
        payload: Option<Buffer>,
    ) -> Result<(), ConnectionError> {
        self.dispatch(remote, Command::Disconnect(payload))
    }

    fn dispatch(&self, remote: SocketAddr, command: Command) -> Result<(), ConnectionError> {
        let peers = self.peers.lock().expect("listener peer map mutex poisoned");
        let tx = peers
            .get(&remote)
            .ok_or(ConnectionError::InvalidArgument("no such peer"))?;
        tx.send(command)
            .map_err(|_| ConnectionError::ConnectionDisconnected)
    }

    /// Stops accepting, closes every peer connection, and releases the
    /// socket.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ListenerTask {
    local_addr: SocketAddr,
    socket: Arc<UdpSocket>,
    config: ListenerConfig,
    callbacks: ListenerCallbacks,
    per_peer_callbacks: Box<dyn Fn() -> Callbacks + Send>,
    peers: PeerMap,
}

impl ListenerTask {
    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) {
        let mut recv_buf = [0u8; 1500];
        loop {
            tokio::select! {
                biased;

                _ = &mut stop_rx => {
                    debug!(local_addr = %self.local_addr, "listener stopping");
                    break;
                }

                result = self.socket.recv_from(&mut recv_buf) => {
                    match result {
                        Ok((n, from)) => self.handle_datagram(&recv_buf[..n], from),
                        Err(err) => {
                            warn!(local_addr = %self.local_addr, error = %err, "listener socket receive failed");
                        }
                    }
                }
            }
        }

        let mut peers = self.peers.lock().expect("listener peer map mutex poisoned");
        for (_, tx) in peers.drain() {
            let _ = tx.send(Command::Close);
        }
    }

    fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr) {
        let mut peers = self.peers.lock().expect("listener peer map mutex poisoned");
        peers.retain(|_, tx| !tx.is_closed());

        if let Some(tx) = peers.get(&from) {
            let _ = tx.send(Command::Inbound(bytes.to_vec()));
            return;
        }
        drop(peers);

        let Some(&tag) = bytes.first() else {
            warn!(%from, "dropped malformed datagram from unknown peer");
            return;
        };
        if tag != SendOption::Hello.tag() || bytes.len() < 4 {
            warn!(%from, "dropped non-hello datagram from unknown peer");
            return;
        }
        let handshake_payload = &bytes[4..];

        if let Some(cb) = &mut self.callbacks.on_connection_init {
            let rejection = guard_callback("on_connection_init", || cb(from, handshake_payload));
            if let Some(rejection) = rejection {
                let reply = PeerState::build_disconnect(Some(rejection.as_bytes()));
                let socket = Arc::clone(&self.socket);
                tokio::spawn(async move {
                    let _ = socket.send_to(&reply, from).await;
                });
                info!(%from, "admission rejected");
                return;
            }
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let peer = PeerState::new(from, self.config.connection, ConnectionState::Connected);
        let state = Arc::new(Mutex::new(ConnectionState::Connected));
        let actor = Actor {
            socket: Arc::clone(&self.socket),
            is_shared_socket: true,
            peer,
            command_rx,
            callbacks: (self.per_peer_callbacks)(),
            state,
            handshake_tx: None,
        };
        tokio::spawn(actor.run(None));
        let _ = command_tx.send(Command::Inbound(bytes.to_vec()));
        self.peers
            .lock()
            .expect("listener peer map mutex poisoned")
            .insert(from, command_tx);

        info!(%from, "peer admitted");
        if let Some(cb) = &mut self.callbacks.on_new_connection {
            let handshake = Buffer::from_bytes(handshake_payload);
            guard_callback("on_new_connection", || cb(from, handshake));
        }
    }
}
