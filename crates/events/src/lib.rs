//! Gateway event types and wire encodings.
//!
//! Defines the discriminated event union pushed to connected viewers,
//! the JSON envelope for structured events, and the binary framing used
//! for preview images.

pub mod event;
pub mod frame;

pub use event::{ExecInfo, GatewayEvent, PreviewFormat, QueueInfo};
pub use frame::{decode_binary_frame, encode_binary_frame, BinaryEventKind};
