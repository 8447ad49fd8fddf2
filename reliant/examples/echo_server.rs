//! A server that echoes back every message it receives, prefixed with "you
//! sent: ".
//!
//! Run with `cargo run --example echo_server`, then `cargo run --example
//! echo_client -- 127.0.0.1:7777`.

use reliant::{
    callbacks::{Callbacks, ListenerCallbacks},
    config::ListenerConfig,
    error::ConnectionError,
    Listener,
};
use reliant_proto::SendOption;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ConnectionError> {
    tracing_subscriber::fmt::init();

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();

    let listener_callbacks = ListenerCallbacks::default()
        .on_connection_init(Box::new(|remote, hello| {
            info!(%remote, hello_len = hello.len(), "admitting peer");
            None
        }))
        .on_new_connection(Box::new(|remote, handshake| {
            info!(%remote, payload = ?handshake.as_bytes(), "peer connected");
        }));

    let listener = Listener::bind(
        "0.0.0.0:7777".parse().unwrap(),
        ListenerConfig::default(),
        listener_callbacks,
        move || {
            let inbound_tx = inbound_tx.clone();
            Callbacks::default()
                .on_data_received(Box::new(move |remote, buffer, _option| {
                    let _ = inbound_tx.send((remote, buffer.as_bytes().to_vec()));
                }))
                .on_disconnected(Box::new(|_, reason| {
                    info!(?reason, "peer disconnected");
                }))
        },
    )
    .await?;

    info!(local_addr = %listener.local_addr(), "echo server listening");

    while let Some((remote, payload)) = inbound_rx.recv().await {
        let mut reply = b"you sent: ".to_vec();
        reply.extend_from_slice(&payload);
        info!(%remote, ?payload, "echoing back");
        let _ = listener.send_bytes_to(remote, reply, SendOption::Reliable);
    }

    Ok(())
}
