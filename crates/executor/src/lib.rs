//! Executor interface and queue plumbing.
//!
//! The graph executor proper (node implementations, device management)
//! lives outside this workspace. This crate defines the narrow seam the
//! gateway consumes: the [`Executor`] trait, queue entry types, and
//! completion handles; plus [`QueueExecutor`], the in-process queue
//! bookkeeping a runner drives via [`QueueExecutor::take_next`] /
//! [`QueueExecutor::finish`], and the node registry used for structural
//! validation.

pub mod engine;
pub mod entry;
pub mod queue;
pub mod registry;
pub mod validate;

pub use engine::Executor;
pub use entry::{
    CompletionReceiver, CompletionSender, ExecutionFailure, OutputMap, QueueEntry, QueueSnapshot,
};
pub use queue::{HistoryEntry, QueueExecutor};
pub use registry::{NodeDescriptor, NodeRegistry, NodeSource};
pub use validate::{validate_structure, ValidationError, ValidationOutcome};
