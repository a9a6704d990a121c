//! In-process job queue: the reference [`Executor`] implementation.
//!
//! [`QueueExecutor`] owns the pending heap, the running set, and the
//! history map. The gateway talks to it through the [`Executor`] trait;
//! an external runner drives it from its own task or thread via
//! [`QueueExecutor::take_next`] and [`QueueExecutor::finish`], which
//! resolves the entry's completion handle exactly once.
//!
//! Dequeue order is priority-then-submission-sequence; negative
//! priorities jump the line.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::Executor;
use crate::entry::{CompletionSender, ExecutionFailure, OutputMap, QueueEntry, QueueSnapshot};
use crate::registry::NodeRegistry;
use crate::validate::{validate_structure, ValidationOutcome};

/// One finished job in the history map.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub prompt: QueueSnapshot,
    pub outputs: OutputMap,
    pub status: HistoryStatus,
    /// Completion time, unix milliseconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Success,
    Error { message: String },
}

/// A job claimed by a runner. The completion handle stays inside the
/// executor until [`QueueExecutor::finish`] is called.
#[derive(Debug)]
pub struct ClaimedJob {
    pub job_id: Uuid,
    pub priority: f64,
    pub payload: serde_json::Value,
    pub extra: serde_json::Map<String, serde_json::Value>,
    pub outputs: Vec<String>,
}

struct PendingJob(QueueEntry);

impl PartialEq for PendingJob {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingJob {}

impl PartialOrd for PendingJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingJob {
    // BinaryHeap pops the maximum, so order is inverted: the job with
    // the lowest (priority, seq) compares greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .priority
            .total_cmp(&self.0.priority)
            .then_with(|| other.0.seq.cmp(&self.0.seq))
    }
}

struct RunningJob {
    snapshot: QueueSnapshot,
    completion: Option<CompletionSender>,
}

#[derive(Default)]
struct QueueState {
    pending: BinaryHeap<PendingJob>,
    running: HashMap<Uuid, RunningJob>,
    history: HashMap<Uuid, HistoryEntry>,
}

/// Thread-safe queue bookkeeping behind the [`Executor`] trait.
pub struct QueueExecutor {
    registry: Arc<NodeRegistry>,
    state: Mutex<QueueState>,
}

impl QueueExecutor {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Claim the next pending job, if any, moving it to the running set.
    pub async fn take_next(&self) -> Option<ClaimedJob> {
        let mut state = self.state.lock().await;
        let PendingJob(entry) = state.pending.pop()?;
        let claimed = ClaimedJob {
            job_id: entry.job_id,
            priority: entry.priority,
            payload: entry.payload.clone(),
            extra: entry.extra.clone(),
            outputs: entry.outputs.clone(),
        };
        state.running.insert(
            entry.job_id,
            RunningJob {
                snapshot: entry.snapshot(),
                completion: entry.completion,
            },
        );
        Some(claimed)
    }

    /// Report a claimed job finished, recording history and resolving
    /// the completion handle exactly once.
    pub async fn finish(&self, job_id: Uuid, result: Result<OutputMap, ExecutionFailure>) {
        let mut state = self.state.lock().await;
        let Some(running) = state.running.remove(&job_id) else {
            tracing::warn!(%job_id, "Finish reported for a job that is not running");
            return;
        };

        let (status, outputs) = match &result {
            Ok(outputs) => (HistoryStatus::Success, outputs.clone()),
            Err(failure) => (
                HistoryStatus::Error {
                    message: failure.to_string(),
                },
                OutputMap::new(),
            ),
        };

        state.history.insert(
            job_id,
            HistoryEntry {
                prompt: running.snapshot,
                outputs,
                status,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        );
        drop(state);

        if let Some(completion) = running.completion {
            // The submitter may have gone away; that must not fail the job.
            let _ = completion.send(result);
        }
    }
}

#[async_trait]
impl Executor for QueueExecutor {
    async fn enqueue(&self, entry: QueueEntry) {
        tracing::debug!(
            job_id = %entry.job_id,
            priority = entry.priority,
            seq = entry.seq,
            "Job enqueued",
        );
        self.state.lock().await.pending.push(PendingJob(entry));
    }

    async fn current_queue(&self) -> (Vec<QueueSnapshot>, Vec<QueueSnapshot>) {
        let state = self.state.lock().await;
        let running = state.running.values().map(|r| r.snapshot.clone()).collect();
        let mut pending: Vec<&PendingJob> = state.pending.iter().collect();
        pending.sort_by(|a, b| b.cmp(a));
        (running, pending.iter().map(|p| p.0.snapshot()).collect())
    }

    async fn history(&self, job_id: Option<Uuid>) -> serde_json::Value {
        let state = self.state.lock().await;
        let entries: Vec<(&Uuid, &HistoryEntry)> = match job_id {
            Some(id) => state.history.get_key_value(&id).into_iter().collect(),
            None => state.history.iter().collect(),
        };
        let map: serde_json::Map<String, serde_json::Value> = entries
            .into_iter()
            .map(|(id, entry)| {
                (
                    id.to_string(),
                    serde_json::to_value(entry).expect("history entry serialization"),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }

    async fn tasks_remaining(&self) -> usize {
        let state = self.state.lock().await;
        state.pending.len() + state.running.len()
    }

    async fn clear_queue(&self) {
        self.state.lock().await.pending.clear();
    }

    async fn clear_history(&self) {
        self.state.lock().await.history.clear();
    }

    async fn delete_queue_item(&self, job_id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        let before = state.pending.len();
        // Dropping the entry drops its completion sender; an awaiting
        // submitter observes the closed channel.
        let kept: BinaryHeap<PendingJob> = state
            .pending
            .drain()
            .filter(|p| p.0.job_id != job_id)
            .collect();
        state.pending = kept;
        state.pending.len() != before
    }

    async fn delete_history_item(&self, job_id: Uuid) {
        self.state.lock().await.history.remove(&job_id);
    }

    async fn validate(&self, payload: &serde_json::Value) -> ValidationOutcome {
        validate_structure(payload, &self.registry)
    }
}
