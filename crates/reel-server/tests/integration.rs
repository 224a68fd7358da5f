//! End-to-end tests: real server on an ephemeral port, SSE read with reqwest.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use reel_core::ProjectId;
use reel_server::{
    EventHub, LiveConfig, LiveServer, NoopEmitter, ServerConfig, ShutdownCoordinator,
    StreamTransport, TransportError,
};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    server: Arc<LiveServer>,
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let config = LiveConfig {
            heartbeat_interval: Duration::ZERO,
            ..LiveConfig::default()
        };
        let hub = Arc::new(EventHub::new(
            config,
            Arc::new(NoopEmitter),
            shutdown.token().child_token(),
        ));
        let server = Arc::new(LiveServer::new(ServerConfig::default(), hub, shutdown));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server.serve(listener).await.unwrap();
            })
        };
        Self { server, addr, task }
    }

    fn hub(&self) -> &Arc<EventHub> {
        self.server.hub()
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn wait_for_clients(&self, n: usize) {
        let mut rx = self.hub().subscribe_stats();
        let _ = tokio::time::timeout(WAIT, rx.wait_for(|s| s.total_clients == n))
            .await
            .expect("client count not reached")
            .unwrap();
    }

    async fn stop(self) {
        let coord = Arc::clone(self.server.shutdown());
        coord
            .graceful_shutdown(self.server.hub(), vec![self.task], Some(WAIT))
            .await;
    }
}

type SseItem = Result<eventsource_stream::Event, EventStreamError<reqwest::Error>>;
type Events = Pin<Box<dyn Stream<Item = SseItem> + Send>>;

/// SSE subscription read through `eventsource-stream`; comments are skipped.
struct SseReader {
    events: Events,
}

impl SseReader {
    async fn connect(server: &TestServer, project: &str) -> Self {
        let resp = reqwest::get(server.url(&format!("/api/live?projectId={project}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "text/event-stream");
        Self {
            events: Box::pin(resp.bytes_stream().eventsource()),
        }
    }

    /// Next event's JSON data, or `None` when the stream ends.
    async fn try_next(&mut self) -> Option<Value> {
        let event = tokio::time::timeout(WAIT, self.events.next())
            .await
            .expect("no SSE data within timeout")?;
        Some(serde_json::from_str(&event.ok()?.data).unwrap())
    }

    async fn next_event(&mut self) -> Value {
        self.try_next().await.expect("stream ended")
    }
}

struct FlakyTransport {
    fail: AtomicBool,
}

#[async_trait]
impl StreamTransport for FlakyTransport {
    fn supports_flush(&self) -> bool {
        true
    }

    async fn write_frame(&self, _frame: Bytes) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(TransportError::Write("broken pipe".into()))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn broadcast_reaches_only_subscribed_project() {
    let server = TestServer::start().await;
    let mut a = SseReader::connect(&server, "42").await;
    let mut b = SseReader::connect(&server, "42").await;
    let mut c = SseReader::connect(&server, "7").await;
    for reader in [&mut a, &mut b, &mut c] {
        assert_eq!(reader.next_event().await["type"], "connected");
    }
    server.wait_for_clients(3).await;

    let _ = server
        .hub()
        .broadcast_highlights_updated(ProjectId::new(42), vec![json!({"id": 1, "text": "hi"})]);
    // Sentinel for project 7: C must see it next, not the project-42 event.
    let _ = server
        .hub()
        .broadcast_project_updated(ProjectId::new(7), json!({"id": 7}));

    for reader in [&mut a, &mut b] {
        let event = reader.next_event().await;
        assert_eq!(event["type"], "highlights_updated");
        assert_eq!(event["projectId"], "42");
        assert_eq!(event["data"]["highlights"][0]["text"], "hi");
    }
    let event = c.next_event().await;
    assert_eq!(event["type"], "project_updated");
    assert_eq!(event["projectId"], "7");

    server.stop().await;
}

#[tokio::test]
async fn connected_event_carries_client_id() {
    let server = TestServer::start().await;
    let mut reader = SseReader::connect(&server, "5").await;
    let event = reader.next_event().await;
    assert_eq!(event["type"], "connected");
    assert_eq!(event["projectId"], "5");
    let id = event["data"]["clientId"].as_str().unwrap();
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(event["timestamp"].is_string());
    server.stop().await;
}

#[tokio::test]
async fn failed_send_evicts_client() {
    let server = TestServer::start().await;
    let transport = Arc::new(FlakyTransport {
        fail: AtomicBool::new(false),
    });
    let client = server
        .hub()
        .open_client(ProjectId::new(42), transport.clone())
        .unwrap();
    server.wait_for_clients(1).await;

    transport.fail.store(true, Ordering::SeqCst);
    let _ = server.hub().broadcast_highlights_deleted(ProjectId::new(42), vec![3]);
    server.wait_for_clients(0).await;
    assert!(client.is_closed());
    server.stop().await;
}

#[tokio::test]
async fn broadcast_to_empty_project_is_noop() {
    let server = TestServer::start().await;
    let _ = server
        .hub()
        .broadcast_chat_progress(ProjectId::new(1234), "ep", "s", "nobody listening");
    let health: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["connections"], 0);
    server.stop().await;
}

#[tokio::test]
async fn disconnect_removes_client() {
    let server = TestServer::start().await;
    let mut reader = SseReader::connect(&server, "11").await;
    assert_eq!(reader.next_event().await["type"], "connected");
    server.wait_for_clients(1).await;
    drop(reader);

    // The server notices the closed socket on its next write.
    let deadline = tokio::time::Instant::now() + WAIT;
    while server.hub().client_count() > 0 {
        assert!(tokio::time::Instant::now() < deadline, "client never removed");
        let _ = server
            .hub()
            .broadcast_chat_progress(ProjectId::new(11), "ep", "s", "tick");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.stop().await;
}

#[tokio::test]
async fn missing_project_id_is_rejected() {
    let server = TestServer::start().await;
    let resp = reqwest::get(server.url("/api/live")).await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "MISSING_PROJECT_ID");

    let resp = reqwest::get(server.url("/api/live?projectId=abc")).await.unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(server.hub().client_count(), 0);
    server.stop().await;
}

#[tokio::test]
async fn stats_endpoint_counts_per_project() {
    let server = TestServer::start().await;
    let mut a = SseReader::connect(&server, "42").await;
    let mut b = SseReader::connect(&server, "7").await;
    let _ = a.next_event().await;
    let _ = b.next_event().await;
    server.wait_for_clients(2).await;

    let stats: Value = reqwest::get(server.url("/api/live/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalClients"], 2);
    assert_eq!(stats["projects"]["42"], 1);
    assert_eq!(stats["projects"]["7"], 1);
    server.stop().await;
}

#[tokio::test]
async fn shutdown_sends_disconnected_and_ends_streams() {
    let server = TestServer::start().await;
    let mut reader = SseReader::connect(&server, "3").await;
    assert_eq!(reader.next_event().await["type"], "connected");
    server.wait_for_clients(1).await;

    let hub = Arc::clone(server.hub());
    server.stop().await;

    assert_eq!(reader.next_event().await["type"], "disconnected");
    assert!(reader.try_next().await.is_none());
    assert_eq!(hub.client_count(), 0);
}
