//! Shared domain types for the weft gateway.
//!
//! Holds the error taxonomy used across all crates and the
//! content-digest primitives that key the artifact cache.

pub mod digest;
pub mod error;
