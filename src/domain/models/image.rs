//! Transport-ready screenshot payload.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Output of the image optimizer: bytes ready to be embedded in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedImage {
    /// Encoded image bytes (original or re-encoded JPEG).
    pub data: Vec<u8>,
    /// MIME type matching `data` ("image/png", "image/jpeg", ...).
    pub media_type: String,
    /// True when compression was unavailable or could not reach the payload
    /// ceiling, so the original (possibly oversized) bytes were kept. A
    /// degraded payload risks a 413 from the provider.
    pub degraded: bool,
}

impl OptimizedImage {
    /// Render as a `data:` URL for OpenAI-compatible `image_url` parts.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, BASE64.encode(&self.data))
    }

    /// Size of the base64 form, which is what actually travels on the wire.
    pub fn base64_len(&self) -> usize {
        self.data.len().div_ceil(3) * 4
    }
}
