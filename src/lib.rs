pub mod common;
pub mod detector;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod platform;
pub mod session;

// Re-export main types for convenience
pub use crate::common::{
    CameraConfig, CameraSelector, IngestSnapshot, IngestStats, PixelFormat, StreamConfig,
    MAX_READER_BUFFERS,
};
pub use crate::detector::{Detection, DetectorAdapter, DetectorBackend, DetectorConfig, TagFamily};
pub use crate::error::{CameraError, Result};
pub use crate::frame::{AcquiredBuffer, FrameBufferView};
pub use crate::ingest::FrameIngestPipeline;
pub use crate::platform::{
    BufferHandle, BufferListener, CameraDeviceHandle, CameraPlatform, CameraService,
    CaptureRequestHandle, CaptureSessionHandle, DeviceEvent, DeviceEventHandler, FrameReader,
    OutputTargetHandle, Plane, ReaderHandle, RequestField, RequestTemplate, SessionEvent,
    SessionEventHandler, SurfaceHandle,
};
pub use crate::session::{DeviceSessionController, LifecycleState};
