use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use weft_events::{GatewayEvent, QueueInfo};
use weft_executor::Executor;

use crate::state::AppState;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Client-supplied session id for continuity across reconnects.
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with the session
/// registry and managed by two tasks (sender + receiver).
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // Empty clientId behaves as absent, matching query-string semantics.
    let client_id = query.client_id.filter(|id| !id.is_empty());
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Registers the session (evicting any prior channel for the same id),
/// replays the current queue/execution view so a reconnecting client
/// resumes coherently, then pumps messages until disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, client_id: Option<String>) {
    let registration = state.sessions.register(client_id).await;
    let session_id = registration.session_id;
    let guard = registration.sender;
    let mut rx = registration.receiver;
    tracing::info!(session_id = %session_id, "WebSocket connected");

    send_initial_view(&state, &session_id).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward registry-channel messages to the socket sink.
    let sender_session_id = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(session_id = %sender_session_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: viewers are read-only; inbound traffic is drained
    // so control frames keep flowing.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(session_id = %session_id, "Pong received");
            }
            Ok(_msg) => {}
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up. The matching variant keeps an evicted connection from
    // removing the channel that replaced it.
    state.sessions.unregister_matching(&session_id, &guard).await;
    send_task.abort();
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

/// Replay current state to a newly registered session: the queue depth,
/// and, when this session owns the currently executing job, the node
/// being executed.
async fn send_initial_view(state: &AppState, session_id: &str) {
    let remaining = state.executor.tasks_remaining().await;
    let status = GatewayEvent::Status {
        status: QueueInfo::new(remaining),
        sid: Some(session_id.to_string()),
    };
    state.events.send_to(session_id, status);

    let view = state.view.read().await;
    if view.current_session.as_deref() == Some(session_id) {
        if let Some(node) = view.last_node.clone() {
            state.events.send_to(
                session_id,
                GatewayEvent::Executing {
                    node: Some(node),
                    prompt_id: view.current_prompt.clone(),
                },
            );
        }
    }
}
