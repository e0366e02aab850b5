use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::api::SharedState;
use super::models::{CommentWithAuthor, Issue};

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── Dashboard events ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    IssueCreated { issue: Issue },
    IssueUpdated { issue: Issue },
    IssueDeleted { issue_id: String },
    CommentPosted { comment: CommentWithAuthor },
}

// ── WebSocket handler ────────────────────────────────────────────────

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let rx = state.ws_tx.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx))
}

async fn handle_socket(socket: WebSocket, rx: broadcast::Receiver<String>) {
    let (sender, receiver) = socket.split();
    debug!("dashboard subscriber connected");
    run_socket_loop(sender, receiver, rx).await;
    debug!("dashboard subscriber disconnected");
}

/// Forward broadcast events to one client with ping/pong keepalive.
///
/// If no Pong arrives within [`PONG_TIMEOUT`] after a Ping, the connection
/// is considered dead and the loop exits.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // First tick completes immediately.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    break;
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "dashboard subscriber lagged");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

// ── Broadcast helper ─────────────────────────────────────────────────

/// Serialize and broadcast a WsMessage to every connected dashboard.
/// Having no subscribers is not an error.
pub fn broadcast_message(tx: &broadcast::Sender<String>, msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => {
            warn!(error = %e, "failed to serialize dashboard event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civic::db::tests::sample_issue;
    use crate::civic::registry::IssueStatus;

    #[test]
    fn test_issue_created_serialization() {
        let msg = WsMessage::IssueCreated {
            issue: sample_issue("i-1", "u-1", IssueStatus::Pending),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "IssueCreated");
        assert_eq!(json["data"]["issue"]["id"], "i-1");
        assert_eq!(json["data"]["issue"]["status"], "pending");
    }

    #[test]
    fn test_issue_deleted_serialization() {
        let msg = WsMessage::IssueDeleted {
            issue_id: "i-9".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "IssueDeleted");
        assert_eq!(json["data"]["issue_id"], "i-9");
    }

    #[test]
    fn test_roundtrip_deserialization() {
        let msg = WsMessage::IssueUpdated {
            issue: sample_issue("i-2", "u-1", IssueStatus::Resolved),
        };
        let json = serde_json::to_string(&msg).unwrap();
        match serde_json::from_str::<WsMessage>(&json).unwrap() {
            WsMessage::IssueUpdated { issue } => {
                assert_eq!(issue.id, "i-2");
                assert_eq!(issue.status, IssueStatus::Resolved);
            }
            other => panic!("Expected IssueUpdated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let (tx, mut rx) = broadcast::channel(16);
        broadcast_message(
            &tx,
            &WsMessage::IssueDeleted {
                issue_id: "i-3".into(),
            },
        );
        let received = rx.recv().await.unwrap();
        assert!(received.contains("IssueDeleted"));
        assert!(received.contains("i-3"));
    }

    #[tokio::test]
    async fn test_broadcast_without_receivers_does_not_panic() {
        let (tx, rx) = broadcast::channel::<String>(16);
        drop(rx);
        broadcast_message(
            &tx,
            &WsMessage::IssueDeleted {
                issue_id: "i-4".into(),
            },
        );
    }

    #[test]
    fn test_keepalive_constants() {
        assert!(PONG_TIMEOUT > PING_INTERVAL);
    }
}
