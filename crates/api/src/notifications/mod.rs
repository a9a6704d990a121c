//! Event fan-out from the executor to connected sessions.
//!
//! A single ordered dispatch queue feeds one consumer loop, so
//! per-session delivery order matches enqueue order no matter which
//! thread produced an event.

mod broadcaster;

pub use broadcaster::{event_channel, run_dispatch_loop, EventSender, ExecutionView};
