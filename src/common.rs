//! Shared configuration and counter types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detector::DetectorConfig;
use crate::error::{CameraError, Result};

/// Reader pool depth.
///
/// Matches the platform's internal double-buffering; a deeper pool only adds
/// latency because the platform drops older frames instead of queuing.
pub const MAX_READER_BUFFERS: u32 = 2;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Yuv420 = 0,
    Nv12 = 1,
    Rgba8888 = 2,
    Raw16 = 3,
    Jpeg = 4,
}

impl PixelFormat {
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(PixelFormat::Yuv420),
            1 => Some(PixelFormat::Nv12),
            2 => Some(PixelFormat::Rgba8888),
            3 => Some(PixelFormat::Raw16),
            4 => Some(PixelFormat::Jpeg),
            _ => None,
        }
    }
}

/// Which enumerated device the controller should open.
///
/// Selection is deterministic: the same enumerated list always resolves to
/// the same device, and a selector that matches nothing is an error rather
/// than a fallback to some other camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraSelector {
    /// Position in the platform's enumeration order.
    Index(usize),
    /// Exact platform device id.
    DeviceId(String),
}

impl CameraSelector {
    /// Resolve this selector against an enumerated device list.
    pub fn select<'a>(&self, devices: &'a [String]) -> Option<&'a str> {
        match self {
            CameraSelector::Index(index) => devices.get(*index).map(String::as_str),
            CameraSelector::DeviceId(id) => {
                devices.iter().find(|device| *device == id).map(String::as_str)
            }
        }
    }
}

impl Default for CameraSelector {
    /// The second enumerated channel, the passthrough sensor on headset
    /// targets.
    fn default() -> Self {
        CameraSelector::Index(1)
    }
}

/// Negotiated stream geometry for the reader and capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub max_buffers: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 960,
            format: PixelFormat::Yuv420,
            max_buffers: MAX_READER_BUFFERS,
        }
    }
}

/// Top-level configuration handed in by the embedding layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub selector: CameraSelector,
    #[serde(default)]
    pub stream: StreamConfig,
    /// Detector settings; `None` leaves frames unscanned.
    #[serde(default)]
    pub detector: Option<DetectorConfig>,
}

impl CameraConfig {
    /// Parse a configuration from the JSON form the embedding layer passes
    /// across the managed boundary.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CameraError::InvalidConfiguration(format!("invalid camera config JSON: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| CameraError::InvalidConfiguration(format!("failed to serialize camera config: {e}")))
    }
}

/// Ingest counters, updated from the frame callback without taking a lock.
#[derive(Debug, Default)]
pub struct IngestStats {
    frames_processed: AtomicU64,
    frames_dropped: AtomicU64,
    detections: AtomicU64,
    last_detect_micros: AtomicU64,
    total_detect_micros: AtomicU64,
}

impl IngestStats {
    pub(crate) fn record_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_detect(&self, detections: usize, elapsed: Duration) {
        self.detections.fetch_add(detections as u64, Ordering::Relaxed);
        let micros = elapsed.as_micros() as u64;
        self.last_detect_micros.store(micros, Ordering::Relaxed);
        self.total_detect_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            last_detect: Duration::from_micros(self.last_detect_micros.load(Ordering::Relaxed)),
            total_detect: Duration::from_micros(self.total_detect_micros.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of the ingest counters for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestSnapshot {
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub detections: u64,
    pub last_detect: Duration,
    pub total_detect: Duration,
}
