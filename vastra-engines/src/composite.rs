//! Image compositing engine.

use std::io::Cursor;
use std::time::{Duration, Instant};

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde_json::json;
use tracing::debug;
use vastra_job_queue::{
    async_trait, InferenceEngine, InferenceError, InferenceMetrics, InferenceOutput,
    InferenceRequest,
};

use crate::engine_names;

/// Share of the subject's width and height the overlay may cover.
const OVERLAY_FRACTION: f32 = 0.6;

/// Deterministic engine that pastes the overlay, scaled to fit, onto the
/// centre of the subject and returns the result as PNG.
///
/// Without an overlay the subject is re-encoded unchanged. A configurable
/// delay stands in for model latency when exercising the service end to end.
#[derive(Debug, Clone)]
pub struct CompositeEngine {
    latency: Duration,
    overlay_fraction: f32,
}

impl Default for CompositeEngine {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            overlay_fraction: OVERLAY_FRACTION,
        }
    }
}

impl CompositeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before every inference.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Override the overlay's maximum share of the subject (clamped to `0.05..=1.0`).
    pub fn with_overlay_fraction(mut self, fraction: f32) -> Self {
        self.overlay_fraction = fraction.clamp(0.05, 1.0);
        self
    }
}

#[async_trait]
impl InferenceEngine for CompositeEngine {
    fn name(&self) -> &str {
        engine_names::COMPOSITE
    }

    async fn infer(&self, request: InferenceRequest) -> Result<InferenceOutput, InferenceError> {
        let started = Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let fraction = self.overlay_fraction;
        let InferenceRequest {
            job_id,
            subject,
            overlay,
        } = request;
        let (png, details) = tokio::task::spawn_blocking(move || {
            composite(&subject, overlay.as_deref(), fraction)
        })
        .await
        .map_err(|e| InferenceError::Aborted(e.to_string()))??;

        let engine_time_ms = started.elapsed().as_millis() as u64;
        debug!(%job_id, engine_time_ms, bytes = png.len(), "composite rendered");

        Ok(InferenceOutput {
            artifact: Bytes::from(png),
            metrics: InferenceMetrics {
                engine_time_ms: Some(engine_time_ms),
                details,
                ..Default::default()
            },
        })
    }
}

fn decode(field: &str, bytes: &[u8]) -> Result<DynamicImage, InferenceError> {
    image::load_from_memory(bytes)
        .map_err(|e| InferenceError::UnsupportedInput(format!("{field} image: {e}")))
}

fn composite(
    subject: &[u8],
    overlay: Option<&[u8]>,
    fraction: f32,
) -> Result<(Vec<u8>, serde_json::Value), InferenceError> {
    let mut base: RgbaImage = decode("subject", subject)?.to_rgba8();
    let (width, height) = base.dimensions();

    let placement = match overlay {
        Some(bytes) => {
            let garment = decode("overlay", bytes)?;
            let max_w = ((width as f32 * fraction) as u32).max(1);
            let max_h = ((height as f32 * fraction) as u32).max(1);
            let scaled = garment.resize(max_w, max_h, FilterType::Triangle).to_rgba8();
            let (sw, sh) = scaled.dimensions();
            let x = (width.saturating_sub(sw) / 2) as i64;
            let y = (height.saturating_sub(sh) / 2) as i64;
            imageops::overlay(&mut base, &scaled, x, y);
            Some(json!({ "x": x, "y": y, "width": sw, "height": sh }))
        }
        None => None,
    };

    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(base)
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| InferenceError::Backend(format!("png encode: {e}")))?;

    let details = json!({
        "width": width,
        "height": height,
        "overlay": placement,
    });
    Ok((out.into_inner(), details))
}
