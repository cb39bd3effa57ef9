//! Screenshot payload optimization.
//!
//! Provider request bodies carry the screenshot as a base64 data URL, so an
//! uncompressed desktop capture can blow past endpoint size limits. The
//! optimizer re-encodes large screenshots as JPEG, stepping dimension and
//! quality down until the payload fits under the configured ceiling.
//!
//! Optimization never fails the pipeline: undecodable input is forwarded
//! as-is with the `degraded` flag set, and the provider gets to complain.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::{debug, error, warn};

use crate::domain::models::{OptimizedImage, OptimizerConfig};

/// Re-encodes screenshots to fit provider payload limits.
pub struct ImageOptimizer {
    config: OptimizerConfig,
}

impl ImageOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Optimize raw screenshot bytes for transport.
    ///
    /// Small inputs pass through untouched with their original format.
    /// Larger inputs are decoded and re-encoded as JPEG; each reduction
    /// step shrinks the longest edge to three quarters and drops quality
    /// by 15 points (floor 30). If no step gets under the ceiling the
    /// smallest encoding is returned with `degraded` set.
    pub fn optimize(&self, bytes: &[u8]) -> OptimizedImage {
        if bytes.len() <= self.config.passthrough_threshold_bytes {
            return OptimizedImage {
                data: bytes.to_vec(),
                media_type: sniff_media_type(bytes).to_string(),
                degraded: false,
            };
        }

        let decoded = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(e) => {
                error!(input_bytes = bytes.len(), "failed to decode screenshot: {e}");
                return OptimizedImage {
                    data: bytes.to_vec(),
                    media_type: sniff_media_type(bytes).to_string(),
                    degraded: true,
                };
            }
        };

        let mut dimension = self.config.max_dimension;
        let mut quality = self.config.jpeg_quality;
        let mut best: Option<Vec<u8>> = None;

        for step in 0..=self.config.reduction_steps {
            let resized = if decoded.width() > dimension || decoded.height() > dimension {
                decoded.resize(dimension, dimension, FilterType::Triangle)
            } else {
                decoded.clone()
            };

            match encode_jpeg(&resized, quality) {
                Ok(encoded) => {
                    debug!(
                        step,
                        dimension,
                        quality,
                        encoded_bytes = encoded.len(),
                        "re-encoded screenshot"
                    );
                    if encoded.len() <= self.config.max_payload_bytes {
                        return OptimizedImage {
                            data: encoded,
                            media_type: "image/jpeg".to_string(),
                            degraded: false,
                        };
                    }
                    if best.as_ref().map_or(true, |b| encoded.len() < b.len()) {
                        best = Some(encoded);
                    }
                }
                Err(e) => {
                    warn!(step, "JPEG encoding failed: {e}");
                }
            }

            dimension = (dimension * 3 / 4).max(1);
            quality = quality.saturating_sub(15).max(30);
        }

        // Every step exceeded the ceiling. Send the smallest encoding and
        // flag the result so callers can see fidelity was sacrificed.
        match best {
            Some(data) => {
                warn!(
                    payload_bytes = data.len(),
                    ceiling = self.config.max_payload_bytes,
                    "screenshot could not be reduced under the payload ceiling"
                );
                OptimizedImage {
                    data,
                    media_type: "image/jpeg".to_string(),
                    degraded: true,
                }
            }
            None => OptimizedImage {
                data: bytes.to_vec(),
                media_type: sniff_media_type(bytes).to_string(),
                degraded: true,
            },
        }
    }
}

fn encode_jpeg(img: &image::DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;
    Ok(buffer.into_inner())
}

/// Identify the image format from magic bytes. Unknown input defaults to
/// PNG, the format screenshot tools emit most often.
fn sniff_media_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else {
        "image/png"
    }
}
