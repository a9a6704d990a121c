//! Queue entry and completion-handle types.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Node id → that node's declared outputs, as reported on completion.
pub type OutputMap = HashMap<String, serde_json::Value>;

/// Sender half of a completion handle. Resolved exactly once by the
/// executor, with the job's output set or a failure.
pub type CompletionSender = oneshot::Sender<Result<OutputMap, ExecutionFailure>>;

/// Receiver half, awaited by the submitting side.
pub type CompletionReceiver = oneshot::Receiver<Result<OutputMap, ExecutionFailure>>;

/// Why a job failed after it was accepted into the queue.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ExecutionFailure {
    /// Node the failure was attributed to, when known.
    pub node_id: Option<String>,
    /// Failure class reported by the executor (e.g. an exception type).
    pub kind: String,
    pub message: String,
}

/// Unit of work handed to the executor's queue.
///
/// Created by the ingestion façade at submission, owned by the executor
/// once enqueued, destroyed after completion is reported and the handle
/// (if any) consumed.
pub struct QueueEntry {
    /// Lower dequeues first; negative jumps the line.
    pub priority: f64,
    /// Submission sequence counter value; breaks priority ties.
    pub seq: u64,
    pub job_id: Uuid,
    /// The node graph, forwarded verbatim.
    pub payload: serde_json::Value,
    /// Side-channel metadata (e.g. session correlation), not interpreted
    /// by validation.
    pub extra: serde_json::Map<String, serde_json::Value>,
    /// Output-node set resolved during validation.
    pub outputs: Vec<String>,
    /// Present only on the submit-and-wait path.
    pub completion: Option<CompletionSender>,
}

impl QueueEntry {
    /// Snapshot for queue inspection endpoints; drops the handle.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            priority: self.priority,
            job_id: self.job_id,
            payload: self.payload.clone(),
        }
    }
}

impl std::fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEntry")
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("job_id", &self.job_id)
            .field("waited_on", &self.completion.is_some())
            .finish_non_exhaustive()
    }
}

/// Serializable view of a queued or running job.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub priority: f64,
    pub job_id: Uuid,
    pub payload: serde_json::Value,
}
