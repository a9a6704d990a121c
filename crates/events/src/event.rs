//! Event union pushed to connected sessions.
//!
//! Structured events travel the text channel as `{"type": <kind>,
//! "data": {...}}` via the internally-tagged serde representation.
//! Preview images never take this path; the broadcaster encodes them
//! with [`crate::frame`] instead.

use serde::{Deserialize, Serialize};

/// All event kinds the gateway can deliver to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Queue-depth broadcast. `sid` is attached only on the initial
    /// message to a freshly registered session.
    Status {
        status: QueueInfo,
        #[serde(skip_serializing_if = "Option::is_none")]
        sid: Option<String>,
    },

    /// A job has started executing.
    ExecutionStart { prompt_id: String },

    /// A specific node is executing; `node == None` means the job has
    /// finished all nodes.
    Executing {
        node: Option<String>,
        prompt_id: Option<String>,
    },

    /// Step-level progress within a long-running node.
    Progress { value: u32, max: u32 },

    /// A node finished and produced output.
    Executed {
        node: String,
        output: serde_json::Value,
        prompt_id: String,
    },

    /// Nodes whose outputs were served from the executor's own cache.
    ExecutionCached {
        nodes: Vec<String>,
        prompt_id: String,
    },

    /// Execution failed at a node.
    ExecutionError {
        prompt_id: String,
        node_id: String,
        exception_type: String,
        exception_message: String,
    },

    /// A low-latency preview image. Dispatched as a binary frame, never
    /// as JSON.
    PreviewImage {
        format: PreviewFormat,
        data: Vec<u8>,
        max_size: Option<u32>,
    },
}

impl GatewayEvent {
    /// Build a queue-depth status event.
    pub fn status(queue_remaining: usize) -> Self {
        Self::Status {
            status: QueueInfo::new(queue_remaining),
            sid: None,
        }
    }

    /// True for events that must be delivered as binary frames.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::PreviewImage { .. })
    }
}

/// Queue state snapshot included in status events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueInfo {
    pub exec_info: ExecInfo,
}

impl QueueInfo {
    pub fn new(queue_remaining: usize) -> Self {
        Self {
            exec_info: ExecInfo { queue_remaining },
        }
    }
}

/// Execution queue statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: usize,
}

/// Encodings a preview image may be delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PreviewFormat {
    Jpeg,
    Png,
}
