//! Platform capability surface consumed by the session controller.
//!
//! The camera hardware service and its buffer reader are external
//! collaborators. These traits capture exactly the operations the core
//! consumes, so a hardware binding or an in-memory test double can be
//! injected behind the same `Arc<dyn CameraPlatform>`.

use std::sync::Arc;

use crate::common::{PixelFormat, StreamConfig};
use crate::error::Result;

/// Opaque handle to an open camera device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraDeviceHandle(pub u64);

/// Handle to a capture request owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureRequestHandle(pub u64);

/// Handle binding one destination surface to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputTargetHandle(pub u64);

/// Handle to a configured capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureSessionHandle(pub u64);

/// Destination surface a session can stream into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Handle to a platform buffer reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderHandle(pub u64);

/// Handle to one image buffer checked out of a reader pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Asynchronous device-level notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Disconnected,
    Error(i32),
}

/// Asynchronous capture-session notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Ready,
    Active,
    Closed,
}

pub type DeviceEventHandler = Arc<dyn Fn(DeviceEvent) + Send + Sync>;
pub type SessionEventHandler = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Invoked by the platform, on a thread it owns, whenever the reader has a
/// buffer ready.
pub type BufferListener = Arc<dyn Fn() + Send + Sync>;

/// Capture request template presets.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTemplate {
    Preview = 1,
    StillCapture = 2,
    Record = 3,
}

/// Typed request fields written before streaming starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestField {
    /// Sensor frame duration in nanoseconds.
    FrameDuration(i64),
}

/// One mapped image plane.
///
/// The memory behind `data` belongs to the platform's buffer pool and stays
/// valid until the owning buffer is released.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub data: *const u8,
    pub len: usize,
    pub row_stride: usize,
}

/// Device, request, and session operations of the camera hardware service.
pub trait CameraService: Send + Sync {
    fn enumerate_devices(&self) -> Vec<String>;

    /// Open a device. `events` receives disconnect/error notifications on a
    /// platform thread for as long as the device stays open.
    fn open(&self, device_id: &str, events: DeviceEventHandler) -> Result<CameraDeviceHandle>;

    fn create_capture_request(
        &self,
        device: CameraDeviceHandle,
        template: RequestTemplate,
    ) -> Result<CaptureRequestHandle>;

    fn set_request_field(&self, request: CaptureRequestHandle, field: RequestField) -> Result<()>;

    fn create_output_target(&self, surface: SurfaceHandle) -> Result<OutputTargetHandle>;

    fn create_session(
        &self,
        device: CameraDeviceHandle,
        targets: &[OutputTargetHandle],
        events: SessionEventHandler,
    ) -> Result<CaptureSessionHandle>;

    /// Submit `request` for continuous resubmission until the device closes.
    fn submit_repeating_request(
        &self,
        session: CaptureSessionHandle,
        request: CaptureRequestHandle,
    ) -> Result<()>;

    // Release calls are infallible and must tolerate handles that are
    // already gone. Closing the device invalidates any session built on it;
    // there is no separate session close.
    fn free_request(&self, request: CaptureRequestHandle);
    fn free_target(&self, target: OutputTargetHandle);
    fn close_device(&self, device: CameraDeviceHandle);
}

/// Buffer reader operations.
pub trait FrameReader: Send + Sync {
    fn create_reader(&self, config: &StreamConfig) -> Result<ReaderHandle>;

    fn set_buffer_listener(&self, reader: ReaderHandle, listener: BufferListener) -> Result<()>;
    fn clear_buffer_listener(&self, reader: ReaderHandle);

    /// The surface the capture session must target to feed this reader.
    fn reader_surface(&self, reader: ReaderHandle) -> Result<SurfaceHandle>;

    /// Most recent buffer, or `None` when the pool is empty. Older frames
    /// are discarded by the platform, not queued.
    fn acquire_latest(&self, reader: ReaderHandle) -> Result<Option<BufferHandle>>;

    fn buffer_format(&self, buffer: BufferHandle) -> Result<PixelFormat>;

    /// Plane memory stays valid until the buffer is released.
    fn plane(&self, buffer: BufferHandle, index: usize) -> Result<Plane>;

    fn release_buffer(&self, reader: ReaderHandle, buffer: BufferHandle);
    fn delete_reader(&self, reader: ReaderHandle);
}

/// Everything the session controller needs from one platform binding.
pub trait CameraPlatform: CameraService + FrameReader {}

impl<T: CameraService + FrameReader> CameraPlatform for T {}
