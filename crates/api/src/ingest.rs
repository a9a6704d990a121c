//! Shared job-ingestion logic.
//!
//! Both submission endpoints funnel through [`admit`]: validate against
//! the executor, assign priority, enqueue, and announce the new queue
//! depth. The synchronous endpoint additionally bridges the executor's
//! completion handle back into its request handler via
//! [`spawn_completion_bridge`].

use std::path::PathBuf;

use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use weft_executor::{
    CompletionReceiver, CompletionSender, Executor, OutputMap, QueueEntry, ValidationOutcome,
};

use crate::files::{DirKind, FileGateway};
use crate::state::AppState;

/// A submission accepted into the queue.
#[derive(Debug)]
pub struct AdmittedJob {
    pub job_id: Uuid,
    /// The priority the entry was enqueued with, echoed to the caller.
    pub number: f64,
}

/// Validate and enqueue one submission.
///
/// An explicit priority is honored verbatim; otherwise the process-wide
/// submission counter is used, negated when `front` asks for
/// front-of-queue placement. Returns the failed [`ValidationOutcome`]
/// without enqueuing when the payload is invalid.
pub async fn admit(
    state: &AppState,
    payload: Value,
    extra: serde_json::Map<String, Value>,
    explicit_priority: Option<f64>,
    front: bool,
    completion: Option<CompletionSender>,
) -> Result<AdmittedJob, ValidationOutcome> {
    let outcome = state.executor.validate(&payload).await;
    if !outcome.valid {
        return Err(outcome);
    }
    let outputs = outcome.outputs;

    Ok(enqueue_validated(state, payload, extra, explicit_priority, front, completion, outputs).await)
}

/// Enqueue a payload that has already passed validation.
///
/// Split out so the synchronous endpoint can consult the artifact cache
/// between validation and enqueue.
pub async fn enqueue_validated(
    state: &AppState,
    payload: Value,
    extra: serde_json::Map<String, Value>,
    explicit_priority: Option<f64>,
    front: bool,
    completion: Option<CompletionSender>,
    outputs: Vec<String>,
) -> AdmittedJob {
    let seq = state.next_seq();
    let priority = match explicit_priority {
        Some(number) => number,
        None => {
            let number = seq as f64;
            if front {
                -number
            } else {
                number
            }
        }
    };

    let job_id = Uuid::new_v4();
    state
        .executor
        .enqueue(QueueEntry {
            priority,
            seq,
            job_id,
            payload,
            extra,
            outputs,
            completion,
        })
        .await;
    state.queue_updated().await;

    AdmittedJob {
        job_id,
        number: priority,
    }
}

/// Outcome of a synchronous submission, produced by the bridge task.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Execution succeeded and produced at least one image.
    Completed { artifact: PathBuf },
    /// Execution succeeded but yielded no images.
    NoContent,
    /// Execution failed, or the entry was dropped before completion.
    Failed(String),
}

/// Bridge a completion handle back to a request handler.
///
/// The spawned task, not the handler, owns the executor-facing
/// receiver: it awaits completion, registers the produced artifact in
/// the cache, and only then hands the outcome over. A client that
/// aborts mid-wait drops the returned receiver; the job still runs to
/// completion and the cache is still populated for the next identical
/// submission.
pub fn spawn_completion_bridge(
    state: AppState,
    digest: String,
    receiver: CompletionReceiver,
) -> oneshot::Receiver<SyncOutcome> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let result = receiver.await;
        // The entry left the queue one way or another; tell the viewers.
        state.queue_updated().await;

        let outcome = match result {
            Err(_) => SyncOutcome::Failed("job was removed before completion".into()),
            Ok(Err(failure)) => SyncOutcome::Failed(failure.to_string()),
            Ok(Ok(outputs)) => {
                match extract_output_images(&outputs, &state.files).last() {
                    None => SyncOutcome::NoContent,
                    Some(artifact) => {
                        if let Err(e) = state.cache.commit(&digest, artifact).await {
                            // Serve the artifact anyway; the next identical
                            // submission simply misses the cache.
                            tracing::error!(digest = %digest, error = %e, "Cache commit failed");
                        }
                        SyncOutcome::Completed {
                            artifact: artifact.clone(),
                        }
                    }
                }
            }
        };

        // The handler may have gone away with the client; that is fine.
        let _ = tx.send(outcome);
    });

    rx
}

/// Collect produced image paths from the executor's output structure.
///
/// Outputs report images either directly under `images` or nested under
/// a `ui` sub-structure; both shapes are checked. Nodes are visited in
/// sorted id order so the last entry is the most recently produced
/// image of the highest node.
pub fn extract_output_images(outputs: &OutputMap, files: &FileGateway) -> Vec<PathBuf> {
    let mut node_ids: Vec<&String> = outputs.keys().collect();
    node_ids.sort();

    let mut paths = Vec::new();
    for node_id in node_ids {
        let node = &outputs[node_id];
        let images = node
            .get("images")
            .or_else(|| node.get("ui").and_then(|ui| ui.get("images")));
        let Some(images) = images.and_then(Value::as_array) else {
            continue;
        };

        for image_ref in images {
            let Some(filename) = image_ref.get("filename").and_then(Value::as_str) else {
                continue;
            };
            let subfolder = image_ref.get("subfolder").and_then(Value::as_str);
            let kind = DirKind::parse(
                image_ref.get("type").and_then(Value::as_str),
                DirKind::Output,
            );

            match files.resolve(kind, subfolder, filename) {
                Ok(path) => paths.push(path),
                Err(e) => {
                    tracing::warn!(
                        node_id = %node_id,
                        filename,
                        error = %e,
                        "Skipping unresolvable output image",
                    );
                }
            }
        }
    }
    paths
}
