//! Fiducial-marker detector adapter.
//!
//! The detection algorithm itself lives in an external library; this module
//! wraps its configuration and per-frame invocation behind a stable
//! capability so the ingest pipeline never talks to the library directly.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::frame::FrameBufferView;

/// Supported tag families.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagFamily {
    Tag36h11 = 0,
    Tag25h9 = 1,
    Tag16h5 = 2,
    TagCircle21h7 = 3,
    TagStandard41h12 = 4,
}

/// Detector settings, applied once when the adapter is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub family: TagFamily,
    /// Maximum hamming distance accepted when decoding a tag.
    pub hamming: u32,
    pub threads: u32,
    /// Input decimation factor; 2.0 runs detection at half resolution.
    pub decimation: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            family: TagFamily::Tag36h11,
            hamming: 0,
            threads: 1,
            decimation: 2.0,
        }
    }
}

/// One decoded tag observation. Valid only for the frame that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub tag_id: u32,
    pub hamming: u32,
    pub decision_margin: f32,
    /// Tag center in pixel coordinates.
    pub center: (f32, f32),
    /// Corner coordinates, counter-clockwise from the tag's origin corner.
    pub corners: [(f32, f32); 4],
}

/// Capability surface of the external detector library.
///
/// Implementations need not be reentrant: the ingest pipeline guarantees at
/// most one `detect` call in flight, always from the same callback context.
pub trait DetectorBackend: Send {
    fn configure(&mut self, config: &DetectorConfig) -> Result<()>;

    /// Scan one luminance image. Must be pure with respect to the input
    /// buffer; an empty result is a normal outcome.
    fn detect(&mut self, view: &FrameBufferView<'_>) -> Result<Vec<Detection>>;
}

/// Wraps the external detector behind `{configure, detect}`.
pub struct DetectorAdapter {
    backend: Box<dyn DetectorBackend>,
    config: DetectorConfig,
}

impl DetectorAdapter {
    /// Configure the backend once; the configuration is immutable for the
    /// adapter's lifetime.
    pub fn new(mut backend: Box<dyn DetectorBackend>, config: DetectorConfig) -> Result<Self> {
        backend.configure(&config)?;
        Ok(Self { backend, config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run detection on one luminance view, timing the call.
    pub fn detect(&mut self, view: &FrameBufferView<'_>) -> Result<(Vec<Detection>, Duration)> {
        let started = Instant::now();
        let detections = self.backend.detect(view)?;
        let elapsed = started.elapsed();
        debug!(
            count = detections.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "detector pass"
        );
        Ok((detections, elapsed))
    }
}
