//! Single-consumer event dispatch loop.
//!
//! Producers (request handlers and the executor, from any thread)
//! push [`GatewayEvent`]s through a clonable [`EventSender`] onto one
//! unbounded mpsc queue. One dedicated loop drains it in order, encodes
//! each event (JSON text, or a binary frame for previews), and fans out
//! through the session registry. The loop also maintains the
//! [`ExecutionView`] replayed to reconnecting sessions.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use weft_events::{encode_binary_frame, BinaryEventKind, GatewayEvent, PreviewFormat};

use crate::files::preview;
use crate::ws::SessionRegistry;

/// One queued delivery: an event and its target session (`None` means
/// every session).
#[derive(Debug)]
struct QueuedEvent {
    event: GatewayEvent,
    target: Option<String>,
}

/// Thread-safe handle for publishing events.
///
/// Sending only enqueues; encoding and fan-out happen on the dispatch
/// loop. Safe to call from outside the async runtime (the executor's
/// thread included).
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<QueuedEvent>,
}

impl EventSender {
    /// Publish an event to one session, or to all when `target` is `None`.
    pub fn send(&self, event: GatewayEvent, target: Option<String>) {
        if self.tx.send(QueuedEvent { event, target }).is_err() {
            tracing::debug!("Event dropped: dispatch loop has shut down");
        }
    }

    /// Publish to every connected session.
    pub fn broadcast(&self, event: GatewayEvent) {
        self.send(event, None);
    }

    /// Publish to a single session.
    pub fn send_to(&self, session_id: &str, event: GatewayEvent) {
        self.send(event, Some(session_id.to_string()));
    }
}

/// What the dispatch loop knows about the job currently executing.
/// Replayed to a session that reconnects mid-execution.
#[derive(Debug, Default)]
pub struct ExecutionView {
    /// Session that submitted the currently executing job.
    pub current_session: Option<String>,
    /// Its job id.
    pub current_prompt: Option<String>,
    /// Node currently executing, cleared when the job finishes.
    pub last_node: Option<String>,
}

/// Create the dispatch queue: a sender handle and the receiver the loop
/// drains.
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Receiver half of the dispatch queue; consumed by [`run_dispatch_loop`].
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<QueuedEvent>,
}

/// Run the dispatch loop until cancelled or all senders are dropped.
pub async fn run_dispatch_loop(
    mut receiver: EventReceiver,
    sessions: Arc<SessionRegistry>,
    view: Arc<RwLock<ExecutionView>>,
    cancel: CancellationToken,
) {
    tracing::info!("Event dispatch loop started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Event dispatch loop shutting down");
                break;
            }
            queued = receiver.rx.recv() => {
                let Some(QueuedEvent { event, target }) = queued else {
                    tracing::info!("Event queue closed, dispatch loop exiting");
                    break;
                };
                update_view(&view, &event, target.as_deref()).await;
                let Some(message) = encode(event) else { continue };
                match target {
                    Some(session_id) => {
                        sessions.send(&session_id, message).await;
                    }
                    None => sessions.broadcast(message).await,
                }
            }
        }
    }
}

/// Track the executing session/node so reconnects can be replayed.
async fn update_view(view: &RwLock<ExecutionView>, event: &GatewayEvent, target: Option<&str>) {
    match event {
        GatewayEvent::ExecutionStart { prompt_id } => {
            let mut view = view.write().await;
            view.current_session = target.map(str::to_string);
            view.current_prompt = Some(prompt_id.clone());
            view.last_node = None;
        }
        GatewayEvent::Executing { node, prompt_id } => {
            let mut view = view.write().await;
            view.last_node = node.clone();
            if prompt_id.is_some() {
                view.current_prompt = prompt_id.clone();
            }
            if let Some(sid) = target {
                view.current_session = Some(sid.to_string());
            }
        }
        _ => {}
    }
}

/// Encode an event for the wire: previews become binary frames, all
/// other kinds a JSON text envelope. Returns `None` when a preview
/// cannot be transcoded (logged, event skipped).
fn encode(event: GatewayEvent) -> Option<Message> {
    match event {
        GatewayEvent::PreviewImage {
            format,
            data,
            max_size,
        } => match encode_preview(format, &data, max_size) {
            Ok(frame) => Some(Message::Binary(frame.into())),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable preview event");
                None
            }
        },
        other => {
            let text = serde_json::to_string(&other).expect("event serialization");
            Some(Message::Text(text.into()))
        }
    }
}

/// Transcode and frame a preview image: bound its size, re-encode in
/// the requested format, prepend the binary event tag.
fn encode_preview(
    format: PreviewFormat,
    data: &[u8],
    max_size: Option<u32>,
) -> Result<Vec<u8>, weft_core::error::CoreError> {
    let encoded = preview::encode_preview_image(data, format, max_size)?;
    Ok(encode_binary_frame(BinaryEventKind::PreviewImage, &encoded))
}
