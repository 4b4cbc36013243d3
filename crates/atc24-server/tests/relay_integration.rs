//! Integration tests for the stream relay.
//!
//! These tests run a local WebSocket server standing in for the upstream
//! event stream and check what reaches the store and the subscribers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use atc24_protocol::Envelope;
use atc24_server::{EventBroadcaster, HubStore, SharedStore, SnapshotStore, StreamRelay, Subscription};

const FLIGHT_PLAN_FRAME: &str = r#"{"t":"FLIGHT_PLAN","d":{"callsign":"UAL123","departing":"KJFK","arriving":"KLAX","flightrules":"IFR","flightlevel":350},"s":"2024-01-17T10:30:00.000Z"}"#;

/// Upstream that sends one flight plan and closes on the first connection,
/// then keeps every later connection open.
async fn start_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut connections = 0;
        while let Ok((tcp, _)) = listener.accept().await {
            connections += 1;
            let first = connections == 1;
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    return;
                };
                if first {
                    ws.send(Message::Text(FLIGHT_PLAN_FRAME.to_string()))
                        .await
                        .unwrap();
                    ws.close(None).await.ok();
                }
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    addr
}

/// Upstream that accepts TCP connections but never answers the handshake.
async fn start_stalled_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });

    addr
}

/// Upstream that completes the handshake and then sends nothing.
async fn start_silent_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    return;
                };
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    addr
}

type RelayHarness = (SharedStore, Arc<EventBroadcaster>, Subscription, tokio::task::JoinHandle<()>);

fn start_relay(url: String) -> RelayHarness {
    start_relay_with(url, |relay| relay)
}

fn start_relay_with(url: String, configure: impl FnOnce(StreamRelay) -> StreamRelay) -> RelayHarness {
    let store: SharedStore = Arc::new(RwLock::new(SnapshotStore::new()));
    let broadcaster = Arc::new(EventBroadcaster::new(64));
    let subscription = broadcaster
        .subscribe(&Envelope::heartbeat("2024-01-17T10:29:00.000Z"))
        .unwrap();

    let relay = configure(StreamRelay::new(
        url,
        Duration::from_millis(50),
        store.clone(),
        broadcaster.clone(),
    ));
    let handle = tokio::spawn(relay.run());

    (store, broadcaster, subscription, handle)
}

/// Next frame as JSON, with timeout.
async fn recv_json(sub: &mut Subscription) -> serde_json::Value {
    let frame = timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("Timed out waiting for frame")
        .expect("Subscription closed");
    serde_json::from_str(&frame).expect("Valid JSON")
}

#[tokio::test]
async fn test_relay_applies_relays_and_reconnects() {
    let addr = start_upstream().await;
    let (store, _broadcaster, mut sub, handle) = start_relay(format!("ws://{}", addr));

    // Skip the greeting
    recv_json(&mut sub).await;

    let status = recv_json(&mut sub).await;
    assert_eq!(status["t"], "WS_STATUS");
    assert_eq!(status["d"]["connected"], true);

    // Relayed verbatim
    let frame = timeout(Duration::from_secs(5), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&*frame, FLIGHT_PLAN_FRAME);

    let down = recv_json(&mut sub).await;
    assert_eq!(down["t"], "WS_STATUS");
    assert_eq!(down["d"]["connected"], false);

    let up = recv_json(&mut sub).await;
    assert_eq!(up["t"], "WS_STATUS");
    assert_eq!(up["d"]["connected"], true);

    let snapshot = store.read().await.get();
    assert!(snapshot.stream.connected);
    let plan = snapshot.stream.flight_plans_main.get(0).unwrap();
    assert_eq!(plan.callsign, "UAL123");
    assert_eq!(plan.arriving, "KLAX");
    // A clean close is not an error
    assert!(snapshot.errors.is_empty());

    handle.abort();
}

#[tokio::test]
async fn test_connect_failure_is_recorded_and_retried() {
    // Reserve a port, then free it so nothing is listening
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let (store, _broadcaster, mut sub, handle) = start_relay(format!("ws://{}", addr));
    recv_json(&mut sub).await;

    for _ in 0..2 {
        let status = recv_json(&mut sub).await;
        assert_eq!(status["t"], "WS_STATUS");
        assert_eq!(status["d"]["connected"], false);
    }

    let snapshot = store.read().await.get();
    assert!(!snapshot.stream.connected);
    assert!(snapshot.errors.len() >= 2);
    assert!(snapshot.errors.iter().all(|e| e.scope == "relay-connect"));

    handle.abort();
}

#[tokio::test]
async fn test_stalled_handshake_times_out_and_retries() {
    let addr = start_stalled_upstream().await;
    let (store, _broadcaster, mut sub, handle) = start_relay_with(format!("ws://{}", addr), |relay| {
        relay.with_connect_timeout(Duration::from_millis(200))
    });
    recv_json(&mut sub).await;

    for _ in 0..2 {
        let status = recv_json(&mut sub).await;
        assert_eq!(status["t"], "WS_STATUS");
        assert_eq!(status["d"]["connected"], false);
    }

    let snapshot = store.read().await.get();
    assert!(!snapshot.stream.connected);
    assert!(!snapshot.errors.is_empty());
    for error in snapshot.errors.iter() {
        assert_eq!(error.scope, "relay-connect");
        assert!(error.message.contains("timed out"), "{}", error.message);
    }

    handle.abort();
}

#[tokio::test]
async fn test_silent_stream_is_dropped_and_reconnected() {
    let addr = start_silent_upstream().await;
    let (store, _broadcaster, mut sub, handle) = start_relay_with(format!("ws://{}", addr), |relay| {
        relay.with_idle_timeout(Duration::from_millis(200))
    });
    recv_json(&mut sub).await;

    let up = recv_json(&mut sub).await;
    assert_eq!(up["t"], "WS_STATUS");
    assert_eq!(up["d"]["connected"], true);

    let down = recv_json(&mut sub).await;
    assert_eq!(down["t"], "WS_STATUS");
    assert_eq!(down["d"]["connected"], false);

    // The watchdog failure goes through the normal retry path
    let again = recv_json(&mut sub).await;
    assert_eq!(again["t"], "WS_STATUS");
    assert_eq!(again["d"]["connected"], true);

    let snapshot = store.read().await.get();
    let error = snapshot.errors.head().unwrap();
    assert_eq!(error.scope, "relay-transport");
    assert!(error.message.contains("no frames"), "{}", error.message);

    handle.abort();
}
