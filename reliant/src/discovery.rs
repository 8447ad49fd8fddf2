//! Passive LAN discovery: a [`Broadcaster`] that announces a server on the
//! local subnet, and a [`Listener`](DiscoveryListener) that watches for those
//! announcements.
//!
//! Independent of [`crate::Connection`]/[`crate::Listener`]: no reliability,
//! novelty, or connection state is involved. The wire format is the
//! two-byte-prefixed datagram from the external interface section, `[0x04,
//! 0x02, ..utf8 payload]`.

use std::net::SocketAddr;

use tokio::{net::UdpSocket, sync::oneshot, time::MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::ConnectionError;

/// The two-byte prefix that marks a LAN discovery announce datagram.
const ANNOUNCE_PREFIX: [u8; 2] = [0x04, 0x02];

/// Periodically broadcasts an announce datagram to `target` (typically a
/// subnet broadcast or multicast address) carrying a caller-supplied payload,
/// e.g. a server name.
///
/// Dropping the `Broadcaster` stops the background task.
pub struct Broadcaster {
    stop_tx: Option<oneshot::Sender<()>>,
}

impl Broadcaster {
    /// Binds an ephemeral socket with broadcast enabled and starts
    /// announcing `payload` to `target` every `interval`.
    pub async fn start(
        target: SocketAddr,
        payload: String,
        interval: std::time::Duration,
    ) -> Result<Self, ConnectionError> {
        let bind_addr: SocketAddr = if target.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(ConnectionError::SocketSend)?;
        socket
            .set_broadcast(true)
            .map_err(ConnectionError::SocketSend)?;

        let mut datagram = Vec::with_capacity(2 + payload.len());
        datagram.extend_from_slice(&ANNOUNCE_PREFIX);
        datagram.extend_from_slice(payload.as_bytes());

        let (stop_tx, mut stop_rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = tick.tick() => {
                        if let Err(err) = socket.send_to(&datagram, target).await {
                            warn!(%target, error = %err, "LAN announce send failed");
                        } else {
                            debug!(%target, "LAN announce sent");
                        }
                    }
                }
            }
        });

        Ok(Self {
            stop_tx: Some(stop_tx),
        })
    }

    /// Stops broadcasting.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watches a well-known port for [`Broadcaster`] announcements.
pub struct DiscoveryListener {
    socket: UdpSocket,
}

impl DiscoveryListener {
    /// Binds `local_addr` (typically `0.0.0.0:<well-known port>`) in
    /// broadcast-reuse mode.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, ConnectionError> {
        let socket = UdpSocket::bind(local_addr)
            .await
            .map_err(ConnectionError::SocketSend)?;
        socket
            .set_broadcast(true)
            .map_err(ConnectionError::SocketSend)?;
        Ok(Self { socket })
    }

    /// Waits for the next announcement, silently skipping any datagram that
    /// doesn't match the announce prefix or isn't valid UTF-8 (same
    /// drop-and-log policy as a malformed application datagram).
    pub async fn recv(&self) -> Result<(SocketAddr, String), ConnectionError> {
        let mut buf = [0u8; 1500];
        loop {
            let (n, from) = self
                .socket
                .recv_from(&mut buf)
                .await
                .map_err(ConnectionError::SocketReceive)?;
            let datagram = &buf[..n];
            if !datagram.starts_with(&ANNOUNCE_PREFIX) {
                warn!(%from, "dropped non-announce datagram on discovery socket");
                continue;
            }
            match std::str::from_utf8(&datagram[2..]) {
                Ok(payload) => return Ok((from, payload.to_owned())),
                Err(_) => {
                    warn!(%from, "dropped announce datagram with invalid utf-8 payload");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn broadcaster_reaches_discovery_listener_over_loopback() {
        let listener = DiscoveryListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let target = listener.socket.local_addr().unwrap();

        let _broadcaster = Broadcaster::start(target, "my-server".to_owned(), Duration::from_millis(20))
            .await
            .unwrap();

        let (_, payload) = tokio::time::timeout(Duration::from_secs(1), listener.recv())
            .await
            .expect("announce received before timeout")
            .unwrap();
        assert_eq!(payload, "my-server");
    }

    #[tokio::test]
    async fn non_announce_datagram_is_skipped() {
        let listener = DiscoveryListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.socket.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"not an announce", addr).await.unwrap();
        sender.send_to(&[0x04, 0x02, b'h', b'i'], addr).await.unwrap();

        let (_, payload) = tokio::time::timeout(Duration::from_secs(1), listener.recv())
            .await
            .expect("announce received before timeout")
            .unwrap();
        assert_eq!(payload, "hi");
    }
}
