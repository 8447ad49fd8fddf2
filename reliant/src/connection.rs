//! See [`Connection`].

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use reliant_proto::{Buffer, SendOption};
use tokio::{net::UdpSocket, sync::mpsc, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    callbacks::{Callbacks, DisconnectReason},
    config::{ConnectionConfig, RETRANSMIT_TICK},
    error::ConnectionError,
    peer::{PeerAction, PeerState},
    state::ConnectionState,
    util::guard_callback,
};

pub(crate) enum Command {
    Send(Buffer),
    SendBytes(Vec<u8>, SendOption),
    Disconnect(Option<Buffer>),
    Close,
    /// A datagram routed in from a shared socket, used when this actor's
    /// peer is owned by a [`crate::Listener`] rather than recv'ing for
    /// itself.
    Inbound(Vec<u8>),
}

/// A client-side connection to a single remote peer.
///
/// Construct one with [`Connection::connect`]. The returned handle is cheap
/// to clone-by-reference (it is just a channel sender plus a shared state
/// flag); the actual socket, reliability engine, and callbacks live on a
/// dedicated Tokio task that this handle talks to.
pub struct Connection {
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    command_tx: mpsc::UnboundedSender<Command>,
    state: Arc<Mutex<ConnectionState>>,
}

impl Connection {
    /// Opens a connection to `remote_addr`, sending `payload` as the
    /// handshake body and waiting up to `timeout` for it to be
    /// acknowledged.
    ///
    /// Binds an ephemeral local UDP socket. Resolves once the hello is
    /// acknowledged (success), the remote disconnects during the handshake,
    /// or `timeout` elapses, whichever happens first; the receive loop keeps
    /// running after a successful return.
    pub async fn connect(
        remote_addr: SocketAddr,
        payload: &[u8],
        timeout: Duration,
        config: ConnectionConfig,
        callbacks: Callbacks,
    ) -> Result<Self, ConnectionError> {
        let bind_addr: SocketAddr = if remote_addr.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(ConnectionError::SocketSend)?;
        socket
            .connect(remote_addr)
            .await
            .map_err(ConnectionError::SocketSend)?;
        let local_addr = socket.local_addr().map_err(ConnectionError::SocketSend)?;

        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (handshake_tx, handshake_rx) = tokio::sync::oneshot::channel();

        let mut peer = PeerState::new(remote_addr, config, ConnectionState::Connecting);
        let hello = peer.build_hello(payload);

        let actor = Actor {
            socket: Arc::new(socket),
            is_shared_socket: false,
            peer,
            command_rx,
            callbacks,
            state: Arc::clone(&state),
            handshake_tx: Some(handshake_tx),
        };
        tokio::spawn(actor.run(Some(hello)));

        let handshake = tokio::time::timeout(timeout, handshake_rx);
        match handshake.await {
            Ok(Ok(Ok(()))) => {
                info!(%remote_addr, "connection established");
                Ok(Self {
                    remote_addr,
                    local_addr,
                    command_tx,
                    state,
                })
            }
            Ok(Ok(Err(err))) => Err(err),
            Ok(Err(_recv_dropped)) => Err(ConnectionError::ConnectionDisconnected),
            Err(_elapsed) => {
                let _ = command_tx.send(Command::Close);
                Err(ConnectionError::HandshakeTimeout)
            }
        }
    }

    /// The address of the remote peer.
    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// The local socket address this connection is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The connection's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("connection state mutex poisoned")
    }

    /// Sends `buffer` using the send option it was constructed with.
    ///
    /// Errors if the connection is not currently [`ConnectionState::Connected`].
    pub fn send(&self, buffer: Buffer) -> Result<(), ConnectionError> {
        if !self.state().can_send() {
            return Err(ConnectionError::InvalidArgument("connection is not connected"));
        }
        self.command_tx
            .send(Command::Send(buffer))
            .map_err(|_| ConnectionError::ConnectionDisconnected)
    }

    /// Frames `bytes` with a one-byte header for `option` and sends them.
    pub fn send_bytes(&self, bytes: Vec<u8>, option: SendOption) -> Result<(), ConnectionError> {
        if !self.state().can_send() {
            return Err(ConnectionError::InvalidArgument("connection is not connected"));
        }
        self.command_tx
            .send(Command::SendBytes(bytes, option))
            .map_err(|_| ConnectionError::ConnectionDisconnected)
    }

    /// Gracefully disconnects, optionally carrying `payload` on the
    /// disconnect datagram. Fires the `on_disconnected` callback locally.
    ///
    /// Errors if `payload` was constructed with
    /// [`SendOption::Reliable`](reliant_proto::SendOption::Reliable): a
    /// disconnect datagram is always sent unreliably.
    pub fn disconnect(&self, payload: Option<Buffer>) -> Result<(), ConnectionError> {
        if let Some(buf) = &payload {
            if buf.send_option() == Some(SendOption::Reliable) {
                return Err(ConnectionError::InvalidArgument(
                    "a disconnect payload cannot use the reliable send option",
                ));
            }
        }
        let _ = self.command_tx.send(Command::Disconnect(payload));
        Ok(())
    }

    /// Ungracefully closes the connection. Does not fire `on_disconnected`.
    pub fn close(&self) {
        let _ = self.command_tx.send(Command::Close);
    }
}

pub(crate) struct Actor {
    pub(crate) socket: Arc<UdpSocket>,
    pub(crate) is_shared_socket: bool,
    pub(crate) peer: PeerState,
    pub(crate) command_rx: mpsc::UnboundedReceiver<Command>,
    pub(crate) callbacks: Callbacks,
    pub(crate) state: Arc<Mutex<ConnectionState>>,
    pub(crate) handshake_tx: Option<tokio::sync::oneshot::Sender<Result<(), ConnectionError>>>,
}

impl Actor {
    /// Runs the actor's event loop until the connection ends. `hello` is
    /// `None` for a server-accepted peer, which starts out already
    /// [`ConnectionState::Connected`] with nothing to send first.
    pub(crate) async fn run(mut self, hello: Option<Vec<u8>>) {
        if let Some(hello) = hello {
            if let Err(err) = self.send_raw(&hello).await {
                self.fail_handshake(ConnectionError::SocketSend(err));
                return;
            }
        }

        let mut retransmit_interval = tokio::time::interval(RETRANSMIT_TICK);
        retransmit_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // `interval_at(now + period, period)` so the first ping lands one
        // interval after the connection starts, not immediately: a bare
        // `interval(period)` fires its first tick right away, which would
        // send a spurious ping while still mid-handshake.
        let mut keep_alive_interval = self.peer.keep_alive.interval().map(|period| {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let mut recv_buf = [0u8; 1500];

        loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle_command(command, &mut keep_alive_interval).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }

                result = self.socket.recv(&mut recv_buf), if !self.is_shared_socket => {
                    match result {
                        Ok(0) => {
                            self.internal_disconnect(ConnectionError::ZeroBytesReceived).await;
                            break;
                        }
                        Ok(n) => {
                            if self.handle_datagram(&recv_buf[..n], &mut keep_alive_interval).await {
                                break;
                            }
                        }
                        Err(err) => {
                            self.internal_disconnect(ConnectionError::SocketReceive(err)).await;
                            break;
                        }
                    }
                }

                _ = retransmit_interval.tick() => {
                    let actions = self.peer.retransmit_tick(Instant::now());
                    if self.run_actions(actions, &mut keep_alive_interval).await {
                        break;
                    }
                }

                _ = tick_optional(&mut keep_alive_interval) => {
                    let actions = self.peer.keep_alive_tick();
                    if self.run_actions(actions, &mut keep_alive_interval).await {
                        break;
                    }
                }
            }
        }

        *self.state.lock().expect("connection state mutex poisoned") = ConnectionState::NotConnected;
    }

    fn fail_handshake(&mut self, err: ConnectionError) {
        if let Some(tx) = self.handshake_tx.take() {
            let _ = tx.send(Err(err));
        }
    }

    /// Returns `true` if the actor should stop running.
    async fn handle_command(
        &mut self,
        command: Command,
        keep_alive_interval: &mut Option<tokio::time::Interval>,
    ) -> bool {
        match command {
            Command::Send(buffer) => {
                let bytes = match buffer.send_option() {
                    Some(SendOption::Reliable) => {
                        let bytes = self.peer.build_reliable(buffer);
                        reset_keep_alive(keep_alive_interval);
                        bytes
                    }
                    _ => buffer.as_bytes().to_vec(),
                };
                self.transmit(&bytes).await
            }
            Command::SendBytes(payload, option) => {
                let mut buf = Buffer::with_send_option(option, 1 + payload.len());
                let _ = buf.write_bytes(&payload);
                let bytes = if option == SendOption::Reliable {
                    let bytes = self.peer.build_reliable(buf);
                    reset_keep_alive(keep_alive_interval);
                    bytes
                } else {
                    buf.as_bytes().to_vec()
                };
                self.transmit(&bytes).await
            }
            Command::Disconnect(payload) => {
                let bytes = PeerState::build_disconnect(payload.as_ref().map(Buffer::as_bytes));
                let _ = self.send_raw(&bytes).await;
                debug!(remote_addr = %self.peer.remote_addr, "sent graceful disconnect");
                if let Some(cb) = &mut self.callbacks.on_disconnected {
                    guard_callback("on_disconnected", || cb(payload, DisconnectReason::Local));
                }
                true
            }
            Command::Close => true,
            Command::Inbound(bytes) => self.handle_datagram(&bytes, keep_alive_interval).await,
        }
    }

    /// Returns `true` if the actor should stop running.
    async fn handle_datagram(
        &mut self,
        bytes: &[u8],
        keep_alive_interval: &mut Option<tokio::time::Interval>,
    ) -> bool {
        let actions = self.peer.handle_datagram(bytes);
        self.run_actions(actions, keep_alive_interval).await
    }

    /// Carries out a batch of [`PeerAction`]s. Returns `true` if the actor
    /// should stop running.
    async fn run_actions(
        &mut self,
        actions: Vec<PeerAction>,
        keep_alive_interval: &mut Option<tokio::time::Interval>,
    ) -> bool {
        for action in actions {
            match action {
                PeerAction::Send(bytes) => {
                    if self.transmit(&bytes).await {
                        return true;
                    }
                }
                PeerAction::SendAck(bytes) => {
                    if let Err(err) = self.send_raw(&bytes).await {
                        warn!(remote_addr = %self.peer.remote_addr, error = %err, "ack send failed, ignoring");
                    }
                }
                PeerAction::Deliver(buffer, option) => {
                    if let Some(cb) = &mut self.callbacks.on_data_received {
                        let remote_addr = self.peer.remote_addr;
                        guard_callback("on_data_received", || cb(remote_addr, buffer, option));
                    }
                }
                PeerAction::KeepAliveReset => reset_keep_alive(keep_alive_interval),
                PeerAction::HandshakeComplete => {
                    *self.state.lock().expect("connection state mutex poisoned") = ConnectionState::Connected;
                    if let Some(tx) = self.handshake_tx.take() {
                        let _ = tx.send(Ok(()));
                    }
                }
                PeerAction::Disconnected(payload, reason) => {
                    debug!(remote_addr = %self.peer.remote_addr, "remote disconnected");
                    if matches!(self.peer.state, ConnectionState::Connecting) {
                        self.fail_handshake(ConnectionError::RemoteDisconnectedDuringHandshake);
                    }
                    if let Some(cb) = &mut self.callbacks.on_disconnected {
                        guard_callback("on_disconnected", || cb(payload, reason));
                    }
                    return true;
                }
                PeerAction::InternalDisconnect(err) => {
                    self.internal_disconnect(err).await;
                    return true;
                }
            }
        }
        false
    }

    async fn internal_disconnect(&mut self, err: ConnectionError) {
        warn!(remote_addr = %self.peer.remote_addr, error = %err, "internal disconnect");
        let farewell = match &mut self.callbacks.on_internal_disconnect {
            Some(cb) => guard_callback("on_internal_disconnect", || cb(&err)),
            None => None,
        };
        if let Some(buf) = &farewell {
            let bytes = PeerState::build_disconnect(Some(buf.as_bytes()));
            let _ = self.send_raw(&bytes).await;
        }
        self.fail_handshake(ConnectionError::ConnectionDisconnected);
        if let Some(cb) = &mut self.callbacks.on_disconnected {
            guard_callback("on_disconnected", || cb(farewell, DisconnectReason::Internal(err)));
        }
    }

    /// Returns `true` if the send failed and the actor should stop.
    async fn transmit(&mut self, bytes: &[u8]) -> bool {
        if let Err(err) = self.send_raw(bytes).await {
            self.internal_disconnect(ConnectionError::SocketSend(err)).await;
            return true;
        }
        false
    }

    /// Sends `bytes` to the peer's remote address, using `send_to` when this
    /// actor's socket is shared across many peers (owned by a
    /// [`crate::Listener`]) rather than `connect`ed to one.
    async fn send_raw(&self, bytes: &[u8]) -> std::io::Result<usize> {
        if self.is_shared_socket {
            self.socket.send_to(bytes, self.peer.remote_addr).await
        } else {
            self.socket.send(bytes).await
        }
    }
}

async fn tick_optional(interval: &mut Option<tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Restarts the idle keep-alive timer, so a ping only fires after a full
/// interval with no reliable traffic.
fn reset_keep_alive(interval: &mut Option<tokio::time::Interval>) {
    if let Some(interval) = interval {
        interval.reset();
    }
}
