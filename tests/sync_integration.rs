//! Integration tests for the builder, broadcast server, relay and display
//! agent talking over real websockets.

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use classwatch::display::{DisplayAgent, StaticSurface};
use classwatch::protocol::ServerMessage;
use classwatch::registry::{BuilderService, Registry};
use classwatch::relay::RelayAgent;
use classwatch::server::{App, BroadcastHub, ServerConfig};
use classwatch::Config;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(10);

fn registry(classes: &[&str]) -> Arc<Registry> {
    Arc::new(Registry {
        last_updated: Some(Utc::now()),
        classes: classes.iter().map(|c| (*c).to_string()).collect(),
        files: vec!["/src/components/Card.tsx".into()],
    })
}

async fn start_server(
    hub: Arc<BroadcastHub>,
    addr: &str,
) -> (SocketAddr, CancellationToken, JoinHandle<classwatch::Result<()>>) {
    let listener = TcpListener::bind(addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let token = CancellationToken::new();
    let app = App::new(ServerConfig::default(), hub);
    let handle = tokio::spawn(app.serve(listener, token.clone()));
    (addr, token, handle)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
    ws
}

async fn next_registry(ws: &mut Client) -> Arc<Registry> {
    loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return ServerMessage::decode(text.as_str()).unwrap().into_registry();
        }
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// A consumer connecting after the baseline gets it as its first message.
#[tokio::test]
async fn test_new_connection_receives_baseline() {
    let hub = Arc::new(BroadcastHub::new());
    let baseline = registry(&["card", "card-title"]);
    hub.publish_baseline(Arc::clone(&baseline));

    let (addr, token, _server) = start_server(Arc::clone(&hub), "127.0.0.1:0").await;
    let mut ws = connect(addr).await;

    let received = next_registry(&mut ws).await;
    assert_eq!(received.classes, baseline.classes);
    assert_eq!(received.files, baseline.files);
    assert_eq!(received.last_updated, baseline.last_updated);

    token.cancel();
}

/// Each broadcast reaches every open connection exactly once.
#[tokio::test]
async fn test_broadcast_reaches_every_connection() {
    let hub = Arc::new(BroadcastHub::new());
    hub.publish_baseline(registry(&["a"]));
    let (addr, token, _server) = start_server(Arc::clone(&hub), "127.0.0.1:0").await;

    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    next_registry(&mut first).await;
    next_registry(&mut second).await;

    assert_eq!(hub.broadcast(registry(&["a", "b"])), 2);
    assert_eq!(next_registry(&mut first).await.classes, vec!["a", "b"]);
    assert_eq!(next_registry(&mut second).await.classes, vec!["a", "b"]);

    drop(second);
    hub.broadcast(registry(&["c"]));
    assert_eq!(next_registry(&mut first).await.classes, vec!["c"]);

    token.cancel();
}

/// Editing a watched file produces a broadcast with the new identifiers.
#[tokio::test]
async fn test_file_change_is_broadcast() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("components");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("Card.tsx"), r#"<div className="card shadow" />"#).unwrap();

    let config = Config {
        scan_dirs: vec![src.clone()],
        debounce_ms: 50,
        ..Config::default()
    };
    let hub = Arc::new(BroadcastHub::new());
    let shutdown = CancellationToken::new();
    tokio::spawn(BuilderService::new(&config, Arc::clone(&hub)).run(shutdown.clone()));
    eventually(|| hub.latest().is_some()).await;

    let (addr, token, _server) = start_server(Arc::clone(&hub), "127.0.0.1:0").await;
    let mut ws = connect(addr).await;
    assert_eq!(next_registry(&mut ws).await.classes, vec!["card", "shadow"]);

    fs::write(src.join("Badge.tsx"), r#"<span className='badge card' />"#).unwrap();

    let update = loop {
        let update = next_registry(&mut ws).await;
        if update.classes.iter().any(|c| c == "badge") {
            break update;
        }
    };
    assert_eq!(update.classes, vec!["badge", "card", "shadow"]);
    assert_eq!(update.files.len(), 2);

    shutdown.cancel();
    token.cancel();
}

/// The relay caches what the server sends and pushes it to display agents.
#[tokio::test]
async fn test_relay_feeds_display_agent() {
    let hub = Arc::new(BroadcastHub::new());
    hub.publish_baseline(registry(&["a", "b"]));
    let (addr, token, _server) = start_server(Arc::clone(&hub), "127.0.0.1:0").await;

    let relay = RelayAgent::new(format!("ws://{addr}/"), Duration::from_millis(50));
    let relay_shutdown = CancellationToken::new();
    tokio::spawn({
        let relay = relay.clone();
        let shutdown = relay_shutdown.clone();
        async move { relay.run(shutdown).await }
    });
    eventually(|| !relay.query().is_placeholder()).await;
    assert_eq!(relay.query().classes, vec!["a", "b"]);

    let agent = DisplayAgent::new(
        Arc::new(StaticSurface::new("page").with_classes(["a"])),
        relay.clone(),
    );
    agent.init().await.unwrap();
    assert_eq!(agent.state().invalid.iter().collect::<Vec<_>>(), vec!["b"]);

    eventually(|| hub.connection_count() == 1).await;
    hub.broadcast(registry(&["a"]));

    let mut updates = agent.watch();
    tokio::time::timeout(
        WAIT,
        updates.wait_for(|s| s.registry.classes == ["a"] && !s.checking && s.invalid.is_empty()),
    )
    .await
    .expect("display agent should revalidate on push")
    .unwrap();

    agent.dispose();
    relay_shutdown.cancel();
    token.cancel();
}

/// After the server goes away the relay keeps its cache and reconnects to
/// the replacement.
#[tokio::test]
async fn test_relay_reconnects_after_server_restart() {
    let first_hub = Arc::new(BroadcastHub::new());
    first_hub.publish_baseline(registry(&["old"]));
    let (addr, first_token, first_server) =
        start_server(Arc::clone(&first_hub), "127.0.0.1:0").await;

    let relay = RelayAgent::new(format!("ws://{addr}/"), Duration::from_millis(50));
    let relay_shutdown = CancellationToken::new();
    tokio::spawn({
        let relay = relay.clone();
        let shutdown = relay_shutdown.clone();
        async move { relay.run(shutdown).await }
    });
    eventually(|| relay.query().classes == ["old"]).await;

    first_token.cancel();
    first_server.await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(relay.query().classes, vec!["old"]);

    let second_hub = Arc::new(BroadcastHub::new());
    second_hub.publish_baseline(registry(&["new"]));
    let (_, second_token, _second_server) =
        start_server(second_hub, &addr.to_string()).await;

    eventually(|| relay.query().classes == ["new"]).await;

    relay_shutdown.cancel();
    second_token.cancel();
}
