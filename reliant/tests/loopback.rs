//! End-to-end tests driving a real [`Connection`] against a real
//! [`Listener`] over loopback UDP.

use std::time::Duration;

use reliant::{
    callbacks::{Callbacks, DisconnectReason, ListenerCallbacks},
    config::{ConnectionConfig, ListenerConfig},
    Buffer, Connection, Listener, SendOption,
};
use tokio::sync::{mpsc, oneshot};

async fn spawn_listener(
    on_new_connection: Option<oneshot::Sender<(std::net::SocketAddr, Vec<u8>)>>,
) -> (Listener, mpsc::UnboundedReceiver<(std::net::SocketAddr, Vec<u8>, SendOption)>) {
    let (data_tx, data_rx) = mpsc::unbounded_channel();
    let mut on_new_connection = on_new_connection;

    let listener_callbacks = ListenerCallbacks::default().on_new_connection(Box::new(move |remote, handshake| {
        if let Some(tx) = on_new_connection.take() {
            let _ = tx.send((remote, handshake.as_bytes().to_vec()));
        }
    }));

    let listener = Listener::bind(
        "127.0.0.1:0".parse().unwrap(),
        ListenerConfig::default(),
        listener_callbacks,
        move || {
            let data_tx = data_tx.clone();
            Callbacks::default().on_data_received(Box::new(move |remote, buffer, option| {
                let _ = data_tx.send((remote, buffer.as_bytes().to_vec(), option));
            }))
        },
    )
    .await
    .unwrap();

    (listener, data_rx)
}

#[tokio::test]
async fn handshake_completes_and_surfaces_payload() {
    let (new_conn_tx, new_conn_rx) = oneshot::channel();
    let (listener, _data_rx) = spawn_listener(Some(new_conn_tx)).await;

    let connection = Connection::connect(
        listener.local_addr(),
        b"hello",
        Duration::from_secs(2),
        ConnectionConfig::default(),
        Callbacks::default(),
    )
    .await
    .unwrap();

    assert_eq!(connection.remote_addr(), listener.local_addr());

    let (from, handshake) = tokio::time::timeout(Duration::from_secs(2), new_conn_rx)
        .await
        .expect("new-connection callback fired before timeout")
        .unwrap();
    assert_eq!(from, connection.local_addr());
    assert_eq!(handshake, b"hello");
}

#[tokio::test]
async fn reliable_message_round_trips_through_echo() {
    let (listener, mut server_rx) = spawn_listener(None).await;

    let (client_data_tx, mut client_data_rx) = mpsc::unbounded_channel();
    let client_callbacks = Callbacks::default().on_data_received(Box::new(move |remote, buffer, option| {
        let _ = client_data_tx.send((remote, buffer.as_bytes().to_vec(), option));
    }));

    let connection = Connection::connect(
        listener.local_addr(),
        b"",
        Duration::from_secs(2),
        ConnectionConfig::default(),
        client_callbacks,
    )
    .await
    .unwrap();

    connection
        .send_bytes(b"ping".to_vec(), SendOption::Reliable)
        .unwrap();

    let (from, payload, option) = tokio::time::timeout(Duration::from_secs(2), server_rx.recv())
        .await
        .expect("server received the message before timeout")
        .unwrap();
    assert_eq!(from, connection.local_addr());
    assert_eq!(payload, b"ping");
    assert_eq!(option, SendOption::Reliable);

    listener
        .send_bytes_to(from, b"pong".to_vec(), SendOption::Reliable)
        .unwrap();

    let (_, payload, option) = tokio::time::timeout(Duration::from_secs(2), client_data_rx.recv())
        .await
        .expect("client received the reply before timeout")
        .unwrap();
    assert_eq!(payload, b"pong");
    assert_eq!(option, SendOption::Reliable);
}

#[tokio::test]
async fn graceful_disconnect_fires_callback_with_local_reason() {
    let (listener, _data_rx) = spawn_listener(None).await;

    let (disconnect_tx, disconnect_rx) = oneshot::channel();
    let mut disconnect_tx = Some(disconnect_tx);
    let callbacks = Callbacks::default().on_disconnected(Box::new(move |_, reason| {
        if let Some(tx) = disconnect_tx.take() {
            let _ = tx.send(matches!(reason, DisconnectReason::Local));
        }
    }));

    let connection = Connection::connect(
        listener.local_addr(),
        b"",
        Duration::from_secs(2),
        ConnectionConfig::default(),
        callbacks,
    )
    .await
    .unwrap();

    connection.disconnect(None).unwrap();

    let was_local = tokio::time::timeout(Duration::from_secs(2), disconnect_rx)
        .await
        .expect("disconnected callback fired before timeout")
        .unwrap();
    assert!(was_local);
}

#[tokio::test]
async fn reliable_disconnect_payload_is_rejected() {
    let (listener, _data_rx) = spawn_listener(None).await;

    let connection = Connection::connect(
        listener.local_addr(),
        b"",
        Duration::from_secs(2),
        ConnectionConfig::default(),
        Callbacks::default(),
    )
    .await
    .unwrap();

    let payload = Buffer::with_send_option(SendOption::Reliable, 4);
    assert!(connection.disconnect(Some(payload)).is_err());
}
