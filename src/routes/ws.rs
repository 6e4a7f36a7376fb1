use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{error, info, warn};

use crate::AppState;
use crate::clients::relay::{Relay, StatusUpdate};
use crate::models::clp::ExecuteOperationParams;

pub const SUCCESS_MESSAGE: &str = "Operation succeeded";

const OUTBOX_CAPACITY: usize = 32;

static NEXT_VIEWER: AtomicU64 = AtomicU64::new(1);

/// Frames pushed to a viewer.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Shared by every viewer; rendered once by the relay.
    Status(Arc<StatusUpdate>),
    Message {
        message: String,
    },
    Error {
        message: String,
    },
}

/// Frames a viewer sends.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ViewerEvent {
    Execute {
        id: String,
        params: ExecuteOperationParams,
    },
}

/// One connected viewer. Everything it is sent goes through `outbox`.
#[derive(Clone)]
pub struct ViewerSession {
    pub id: u64,
    relay: Arc<Relay>,
    outbox: mpsc::Sender<ServerEvent>,
}

impl ViewerSession {
    pub fn new(relay: Arc<Relay>, outbox: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: NEXT_VIEWER.fetch_add(1, Ordering::Relaxed),
            relay,
            outbox,
        }
    }

    /// Subscribes to status broadcasts and forwards them until the outbox closes.
    pub fn spawn_status_forwarder(&self) -> JoinHandle<()> {
        let mut updates = BroadcastStream::new(self.relay.subscribe());
        let outbox = self.outbox.clone();
        let id = self.id;

        tokio::spawn(async move {
            while let Some(item) = updates.next().await {
                match item {
                    Ok(update) => {
                        if outbox.send(ServerEvent::Status(update)).await.is_err() {
                            break;
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(n)) => {
                        warn!("viewer {} skipped {} status updates", id, n);
                    }
                }
            }
        })
    }

    /// Handles one text frame and acknowledges it to this viewer only.
    pub async fn on_text(&self, text: &str) {
        let ack = match serde_json::from_str::<ViewerEvent>(text) {
            Ok(ViewerEvent::Execute { id, params }) => match self.relay.execute(&id, &params).await {
                Ok(()) => ServerEvent::Message {
                    message: SUCCESS_MESSAGE.to_string(),
                },
                Err(e) => ServerEvent::Error {
                    message: e.to_string(),
                },
            },
            Err(e) => {
                warn!("viewer {} sent malformed message: {}", self.id, e);
                ServerEvent::Error {
                    message: format!("malformed message: {}", e),
                }
            }
        };
        let _ = self.outbox.send(ack).await;
    }
}

pub async fn handle_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.relay))
}

async fn handle_socket(socket: WebSocket, relay: Arc<Relay>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOX_CAPACITY);
    let session = ViewerSession::new(relay, tx);
    info!("connect: viewer {}", session.id);

    let forwarder = session.spawn_status_forwarder();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    error!("encoding viewer event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let s = session.clone();
                tokio::spawn(async move {
                    s.on_text(text.as_str()).await;
                });
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    forwarder.abort();
    writer.abort();
    info!("disconnect: viewer {}", session.id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::build_http;
    use crate::models::clp::ClusterStatus;
    use crate::clients::relay::tests::{mount_healthy_cluster, options};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    async fn relay_for(server: &MockServer) -> Arc<Relay> {
        let relay = Arc::new(Relay::new(build_http(false).unwrap()));
        relay.add_cluster_servers(&[options(&server.uri())]).await;
        relay
    }

    async fn next(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("outbox closed")
    }

    fn execute_frame(id: &str, params: serde_json::Value) -> String {
        json!({ "event": "execute", "id": id, "params": params }).to_string()
    }

    #[tokio::test]
    async fn acknowledgment_goes_only_to_the_sender() {
        let server = MockServer::start().await;
        mount_healthy_cluster(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/groups/grpA/move"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "result": { "code": 0, "message": "" } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let relay = relay_for(&server).await;

        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        let one = ViewerSession::new(relay.clone(), tx1);
        let two = ViewerSession::new(relay.clone(), tx2);
        let _f1 = one.spawn_status_forwarder();
        let _f2 = two.spawn_status_forwarder();

        one.on_text(&execute_frame(&server.uri(), json!({ "cmd": "moveGroup", "name": "grpA" })))
            .await;
        match next(&mut rx1).await {
            ServerEvent::Message { message } => assert_eq!(message, SUCCESS_MESSAGE),
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx2.try_recv().is_err());

        // Status broadcasts, unlike acknowledgments, reach every viewer.
        assert_eq!(relay.poll_cycle().await, 1);
        let mut updates = Vec::new();
        for rx in [&mut rx1, &mut rx2] {
            match next(rx).await {
                ServerEvent::Status(update) => {
                    assert_eq!(update.status.id, server.uri());
                    assert!(update.html.as_deref().unwrap().contains("cluster1"));
                    updates.push(update);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        // Both viewers got the one rendering, timestamp included.
        assert!(Arc::ptr_eq(&updates[0], &updates[1]));
    }

    #[tokio::test]
    async fn failed_command_is_acknowledged_with_the_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/servers/server1/reboot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "code": 2, "message": "Server is not running." }
            })))
            .mount(&server)
            .await;
        let relay = relay_for(&server).await;
        let (tx, mut rx) = mpsc::channel(8);
        let session = ViewerSession::new(relay, tx);

        session
            .on_text(&execute_frame(&server.uri(), json!({ "cmd": "rebootServer", "name": "server1" })))
            .await;
        match next(&mut rx).await {
            ServerEvent::Error { message } => assert_eq!(message, "Server is not running."),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_and_malformed_frames_are_rejected() {
        let server = MockServer::start().await;
        let relay = relay_for(&server).await;
        let (tx, mut rx) = mpsc::channel(8);
        let session = ViewerSession::new(relay, tx);

        session
            .on_text(&execute_frame(&server.uri(), json!({ "cmd": "explode" })))
            .await;
        match next(&mut rx).await {
            ServerEvent::Error { message } => assert_eq!(message, "Invalid operation (explode)"),
            other => panic!("unexpected {other:?}"),
        }

        session.on_text("not json").await;
        assert!(matches!(next(&mut rx).await, ServerEvent::Error { .. }));

        session
            .on_text(&execute_frame("http://unregistered", json!({ "cmd": "startCluster" })))
            .await;
        match next(&mut rx).await {
            ServerEvent::Error { message } => assert!(message.contains("http://unregistered")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn events_are_tagged_on_the_wire() {
        let ack = serde_json::to_value(ServerEvent::Message {
            message: SUCCESS_MESSAGE.to_string(),
        })
        .unwrap();
        assert_eq!(ack, json!({ "event": "message", "message": "Operation succeeded" }));

        let update = StatusUpdate {
            status: ClusterStatus {
                id: "http://a".to_string(),
                ..Default::default()
            },
            html: None,
        };
        let status = serde_json::to_value(ServerEvent::Status(Arc::new(update.clone()))).unwrap();
        assert_eq!(status, json!({ "event": "status", "status": { "id": "http://a" } }));

        let rendered = StatusUpdate {
            html: Some("<div>".to_string()),
            ..update
        };
        let status = serde_json::to_value(ServerEvent::Status(Arc::new(rendered))).unwrap();
        assert_eq!(status["html"], "<div>");

        let ViewerEvent::Execute { id, params } = serde_json::from_str(
            r#"{"event":"execute","id":"http://a","params":{"cmd":"stopGroup","name":"g1"}}"#,
        )
        .unwrap();
        assert_eq!(id, "http://a");
        assert_eq!(params, ExecuteOperationParams::new("stopGroup").with_name("g1"));
    }
}
