//! Weft gateway server library.
//!
//! Exposes the building blocks (config, state, error handling, session
//! registry, broadcaster, cache, file gateway, handlers) so integration
//! tests and the binary entrypoint can both access them.

pub mod cache;
pub mod config;
pub mod error;
pub mod files;
pub mod handlers;
pub mod ingest;
pub mod notifications;
pub mod router;
pub mod state;
pub mod ws;
