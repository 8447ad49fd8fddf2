//! Connects to an [`echo_server`](echo_server.rs), sends each line read from
//! stdin as a reliable message, and prints whatever comes back.
//!
//! Run with `cargo run --example echo_client -- 127.0.0.1:7777`.

use std::{env, time::Duration};

use reliant::{callbacks::Callbacks, config::ConnectionConfig, error::ConnectionError, Connection};
use reliant_proto::SendOption;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ConnectionError> {
    tracing_subscriber::fmt::init();

    let remote_addr = env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7777".to_owned())
        .parse()
        .expect("expected an address like 127.0.0.1:7777");

    let callbacks = Callbacks::default()
        .on_data_received(Box::new(|remote, buffer, _option| {
            info!(%remote, payload = ?buffer.as_bytes(), "received");
        }))
        .on_disconnected(Box::new(|_, reason| {
            info!(?reason, "disconnected");
        }));

    let connection = Connection::connect(
        remote_addr,
        b"hello from echo_client",
        Duration::from_secs(5),
        ConnectionConfig::default(),
        callbacks,
    )
    .await?;

    info!(remote_addr = %connection.remote_addr(), local_addr = %connection.local_addr(), "connected");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.expect("stdin read failed") {
        if line.is_empty() {
            continue;
        }
        connection.send_bytes(line.into_bytes(), SendOption::Reliable)?;
    }

    connection.disconnect(None)?;
    Ok(())
}
