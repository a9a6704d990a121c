//! The executor seam consumed by the gateway.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entry::{QueueEntry, QueueSnapshot};
use crate::validate::ValidationOutcome;

/// Narrow interface to the graph executor.
///
/// The executor runs as an independent concurrent unit; the gateway
/// never blocks on it synchronously. Completion handles on the
/// [`QueueEntry`] and the gateway's event queue are the only channels
/// back, both safe to use from any thread.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Hand a validated entry to the queue. Ordering (priority, then
    /// submission sequence) is the executor's responsibility.
    async fn enqueue(&self, entry: QueueEntry);

    /// (running, pending) snapshots, pending in dequeue order.
    async fn current_queue(&self) -> (Vec<QueueSnapshot>, Vec<QueueSnapshot>);

    /// Execution history: `job_id → history entry`, or a single entry
    /// when `job_id` is given.
    async fn history(&self, job_id: Option<Uuid>) -> serde_json::Value;

    /// Jobs not yet finished (pending plus running).
    async fn tasks_remaining(&self) -> usize;

    /// Drop all pending entries.
    async fn clear_queue(&self);

    /// Forget all history.
    async fn clear_history(&self);

    /// Remove one pending entry; `true` if it was found.
    async fn delete_queue_item(&self, job_id: Uuid) -> bool;

    /// Remove one history entry.
    async fn delete_history_item(&self, job_id: Uuid);

    /// Structural/type validation of a submitted payload. A failure
    /// carries both a human-readable summary and a per-node error map,
    /// and the payload must never be enqueued.
    async fn validate(&self, payload: &serde_json::Value) -> ValidationOutcome;
}
