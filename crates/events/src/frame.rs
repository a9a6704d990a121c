//! Binary frame codec for preview events.
//!
//! A binary frame is a 4-byte big-endian unsigned event-type tag
//! followed immediately by the raw payload bytes. There is no length
//! prefix; the frame boundary is the transport message boundary, and a
//! binary frame never carries a JSON envelope.
//!
//! The tag namespace is process-defined and the tag is a `u32` by
//! construction, so the "binary event types must be integers" contract
//! holds at compile time rather than as a runtime check.

/// Process-defined binary event tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BinaryEventKind {
    /// An encoded (JPEG/PNG) preview image.
    PreviewImage = 1,
    /// A raw, not-yet-encoded preview image.
    UnencodedPreviewImage = 2,
}

impl BinaryEventKind {
    /// The wire tag for this kind.
    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// Encode a binary event: big-endian tag, then the payload verbatim.
pub fn encode_binary_frame(kind: BinaryEventKind, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&kind.tag().to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Split a binary frame into its tag and payload.
///
/// Returns `None` for frames shorter than the 4-byte tag.
pub fn decode_binary_frame(frame: &[u8]) -> Option<(u32, &[u8])> {
    if frame.len() < 4 {
        return None;
    }
    let tag = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    Some((tag, &frame[4..]))
}
