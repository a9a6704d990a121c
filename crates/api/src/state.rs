use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use weft_events::GatewayEvent;
use weft_executor::Executor;

use crate::cache::ArtifactCache;
use crate::config::GatewayConfig;
use crate::files::FileGateway;
use crate::notifications::{EventSender, ExecutionView};
use crate::ws::SessionRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// All cross-cutting mutable registries (session map, submission
/// counter, execution view) live here as explicit gateway-owned objects,
/// constructed once at startup, with no ambient singletons. Cheaply
/// cloneable; inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
    /// The external executor, behind its narrow interface.
    pub executor: Arc<dyn Executor>,
    /// Live WebSocket sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Thread-safe handle into the broadcaster's dispatch queue.
    pub events: EventSender,
    /// Broadcaster-maintained view of the currently executing session,
    /// read when a session reconnects.
    pub view: Arc<RwLock<ExecutionView>>,
    /// Content-addressed artifact cache.
    pub cache: Arc<ArtifactCache>,
    /// Path-safe access to the managed directories.
    pub files: Arc<FileGateway>,
    /// Process-wide submission sequence counter.
    pub counter: Arc<AtomicU64>,
}

impl AppState {
    /// Next submission sequence number.
    pub fn next_seq(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Broadcast a fresh queue-depth status event to every session.
    pub async fn queue_updated(&self) {
        let remaining = self.executor.tasks_remaining().await;
        self.events.broadcast(GatewayEvent::status(remaining));
    }
}
