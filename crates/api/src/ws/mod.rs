//! WebSocket infrastructure for real-time viewers.
//!
//! Provides the session registry, heartbeat monitoring, and the HTTP
//! upgrade handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod registry;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use registry::{Registration, SessionRegistry};
