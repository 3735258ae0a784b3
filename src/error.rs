//! Error handling for the passthrough camera core.

use thiserror::Error;

use crate::common::PixelFormat;

/// Result type for camera operations
pub type Result<T> = std::result::Result<T, CameraError>;

/// Errors that can occur while driving a camera session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// No enumerated device matched the configured selector
    #[error("no camera device matched the configured selector")]
    DeviceUnavailable,
    /// Opening the selected device failed
    #[error("failed to open camera device: {0}")]
    DeviceOpenFailed(String),
    /// The device disconnected while a session was active
    #[error("camera device disconnected")]
    DeviceDisconnected,
    /// Building the request, output targets, or session failed
    #[error("capture configuration failed: {0}")]
    CaptureConfigurationFailed(String),
    /// A frame could not be acquired from the reader pool
    #[error("frame acquisition failed: {0}")]
    FrameAcquisitionFailed(String),
    /// The delivered buffer is not in the negotiated stream format
    #[error("unsupported pixel format: {0:?}")]
    UnsupportedFormat(PixelFormat),
    /// The detector rejected a frame
    #[error("detector failure: {0}")]
    DetectorFailure(String),
    /// Invalid configuration error
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// `start` was called while a session is already running
    #[error("camera session already started")]
    AlreadyStarted,
}

impl CameraError {
    /// Whether this error ends the session.
    ///
    /// Per-frame errors are contained inside the ingest pipeline and never
    /// reach the session state machine.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CameraError::FrameAcquisitionFailed(_)
                | CameraError::UnsupportedFormat(_)
                | CameraError::DetectorFailure(_)
        )
    }
}
