//! Path-safe access to the managed directories and preview transcoding.

pub mod preview;
pub mod resolver;

pub use resolver::{DirKind, FileGateway};
