/// Domain-level error taxonomy shared across the workspace.
///
/// Each variant maps to exactly one HTTP outcome at the gateway boundary
/// (see `weft-api`'s `AppError`); library code never touches status codes.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A submitted job failed structural validation. The structured
    /// per-node detail travels alongside as data, not in this string.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An unsafe filesystem access was requested (path traversal,
    /// absolute filename, escape from a managed root).
    #[error("Unsafe path: {0}")]
    Security(String),

    /// The submission queue is over its configured ceiling. Carries the
    /// observed depth and the ceiling so callers can report both.
    #[error("Queue too busy: {depth} entries, limit is {limit}")]
    Capacity { depth: usize, limit: usize },

    /// The executor accepted the job but failed while running it.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// A requested artifact or managed file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Anything unexpected. The message is logged verbatim and sanitized
    /// before it reaches a client.
    #[error("Internal error: {0}")]
    Internal(String),
}
