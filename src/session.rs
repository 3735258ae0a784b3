//! Device and capture-session lifecycle.
//!
//! The controller owns every platform handle behind one lock and drives the
//! state machine below. Platform callbacks (device faults, buffer-ready)
//! arrive on threads the platform owns; they synchronize through the same
//! lock, so a callback that loses the race against `stop` observes
//! `Closing` and backs out without touching a handle.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::common::{CameraConfig, IngestSnapshot, IngestStats};
use crate::detector::{DetectorAdapter, DetectorBackend};
use crate::error::{CameraError, Result};
use crate::ingest::FrameIngestPipeline;
use crate::platform::{
    BufferListener, CameraDeviceHandle, CameraPlatform, CaptureRequestHandle,
    CaptureSessionHandle, DeviceEvent, DeviceEventHandler, OutputTargetHandle, RequestField,
    RequestTemplate, SessionEvent, SessionEventHandler, SurfaceHandle,
};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Lifecycle of one camera session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Opening,
    DeviceReady,
    Configuring,
    Streaming,
    Closing,
    Closed,
    Faulted,
}

impl LifecycleState {
    /// States from which a fresh `start` may proceed.
    fn accepts_start(self) -> bool {
        matches!(self, LifecycleState::Uninitialized | LifecycleState::Closed)
    }
}

/// Everything guarded by the controller's exclusive lock: the state field
/// and every platform handle.
struct Shared {
    state: LifecycleState,
    device: Option<CameraDeviceHandle>,
    request: Option<CaptureRequestHandle>,
    targets: Vec<OutputTargetHandle>,
    session: Option<CaptureSessionHandle>,
    pipeline: Option<FrameIngestPipeline>,
    detector: Option<DetectorAdapter>,
    stats: Arc<IngestStats>,
}

pub(crate) struct ControllerInner {
    platform: Arc<dyn CameraPlatform>,
    config: CameraConfig,
    shared: Mutex<Shared>,
}

impl ControllerInner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Buffer-ready entry point, called from the platform's callback thread.
    fn on_frame_ready(&self) {
        let mut shared = self.lock();
        if shared.state != LifecycleState::Streaming {
            debug!(state = ?shared.state, "buffer-ready after close ignored");
            return;
        }
        let Shared {
            pipeline, detector, ..
        } = &mut *shared;
        if let Some(pipeline) = pipeline.as_mut() {
            pipeline.process_available(detector.as_mut());
        }
    }

    /// Device fault entry point. Any disconnect or device error is fatal to
    /// the session and runs the same teardown as an explicit `stop`.
    fn on_device_event(&self, event: DeviceEvent) {
        let mut shared = self.lock();
        match shared.state {
            LifecycleState::Uninitialized | LifecycleState::Closing | LifecycleState::Closed => {
                debug!(?event, "device event outside an active session ignored");
                return;
            }
            _ => {}
        }
        match event {
            DeviceEvent::Disconnected => warn!("camera device disconnected"),
            DeviceEvent::Error(code) => error!(code, "camera device reported an error"),
        }
        shared.state = LifecycleState::Faulted;
        self.teardown(shared);
    }

    /// Release everything allocated so far and finish in `Closed`.
    ///
    /// Phase one runs under the lock: enter `Closing` and detach the buffer
    /// listener, so no later frame callback touches a handle. The platform
    /// calls themselves run unlocked; a callback thread blocked on the lock
    /// would otherwise deadlock against them.
    fn teardown(&self, mut shared: MutexGuard<'_, Shared>) {
        shared.state = LifecycleState::Closing;
        if let Some(pipeline) = shared.pipeline.as_ref() {
            pipeline.unregister_listener();
        }
        let pipeline = shared.pipeline.take();
        let request = shared.request.take();
        let targets = std::mem::take(&mut shared.targets);
        // The session has no separate close call; closing the device below
        // invalidates it.
        shared.session = None;
        let device = shared.device.take();
        drop(shared);

        // Reverse-acquisition order. Every handle is freed at most once and
        // a missing handle is a no-op, so a partially constructed session
        // tears down the same way a streaming one does.
        if let Some(request) = request {
            self.platform.free_request(request);
        }
        for target in targets.into_iter().rev() {
            self.platform.free_target(target);
        }
        if let Some(device) = device {
            self.platform.close_device(device);
        }
        if let Some(mut pipeline) = pipeline {
            pipeline.shutdown();
        }

        let mut shared = self.lock();
        shared.state = LifecycleState::Closed;
        info!("camera session closed");
    }

    /// Build the full capture path, recording each handle in `shared` as it
    /// is acquired so a failure at any step leaves an exact teardown set.
    fn configure(
        inner: &Arc<Self>,
        shared: &mut Shared,
        surface: SurfaceHandle,
        frame_rate_hz: u32,
    ) -> Result<()> {
        let platform = &inner.platform;

        let devices = platform.enumerate_devices();
        let Some(device_id) = inner.config.selector.select(&devices) else {
            warn!(
                selector = ?inner.config.selector,
                enumerated = devices.len(),
                "no camera device matched the selector"
            );
            return Err(CameraError::DeviceUnavailable);
        };
        let device_id = device_id.to_string();
        info!(device_id = %device_id, "opening camera device");

        let weak = Arc::downgrade(inner);
        let device_events: DeviceEventHandler = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_device_event(event);
            }
        });
        shared.state = LifecycleState::Opening;
        let device = platform
            .open(&device_id, device_events)
            .map_err(open_error)?;
        shared.device = Some(device);
        shared.state = LifecycleState::DeviceReady;

        shared.state = LifecycleState::Configuring;
        let request = platform
            .create_capture_request(device, RequestTemplate::Preview)
            .map_err(configuration_error)?;
        shared.request = Some(request);
        let frame_duration = NANOS_PER_SEC / i64::from(frame_rate_hz);
        platform
            .set_request_field(request, RequestField::FrameDuration(frame_duration))
            .map_err(configuration_error)?;

        let (pipeline, reader_surface) =
            FrameIngestPipeline::new(Arc::clone(platform), inner.config.stream.clone())
                .map_err(configuration_error)?;
        shared.stats = pipeline.stats();
        shared.pipeline = Some(pipeline);

        let display_target = platform
            .create_output_target(surface)
            .map_err(configuration_error)?;
        shared.targets.push(display_target);
        let reader_target = platform
            .create_output_target(reader_surface)
            .map_err(configuration_error)?;
        shared.targets.push(reader_target);

        // Session state notifications are informational; only device-level
        // faults drive the state machine.
        let session_events: SessionEventHandler = Arc::new(|event| match event {
            SessionEvent::Ready => info!("capture session ready"),
            SessionEvent::Active => info!("capture session active"),
            SessionEvent::Closed => info!("capture session closed by platform"),
        });
        let session = platform
            .create_session(device, &shared.targets, session_events)
            .map_err(configuration_error)?;
        shared.session = Some(session);

        let weak = Arc::downgrade(inner);
        let listener: BufferListener = Arc::new(move || {
            let Some(inner) = weak.upgrade() else { return };
            let _ = catch_unwind(AssertUnwindSafe(|| inner.on_frame_ready()));
        });
        if let Some(pipeline) = shared.pipeline.as_ref() {
            pipeline
                .register_listener(listener)
                .map_err(configuration_error)?;
        }

        platform
            .submit_repeating_request(session, request)
            .map_err(configuration_error)?;
        Ok(())
    }
}

fn open_error(err: CameraError) -> CameraError {
    match err {
        CameraError::DeviceOpenFailed(_) => err,
        other => CameraError::DeviceOpenFailed(other.to_string()),
    }
}

fn configuration_error(err: CameraError) -> CameraError {
    match err {
        CameraError::CaptureConfigurationFailed(_) => err,
        other => CameraError::CaptureConfigurationFailed(other.to_string()),
    }
}

/// Owns the device/session lifecycle state machine.
///
/// One instance drives one camera. Nothing here is global, so several
/// controllers over distinct devices can coexist.
pub struct DeviceSessionController {
    inner: Arc<ControllerInner>,
}

impl DeviceSessionController {
    /// Controller without a detector; frames are validated and counted but
    /// not scanned for tags.
    pub fn new(platform: Arc<dyn CameraPlatform>, config: CameraConfig) -> Self {
        Self::build(platform, config, None)
    }

    /// Controller with a detector backend. The backend is configured here,
    /// once, from `config.detector` (falling back to defaults).
    pub fn with_detector(
        platform: Arc<dyn CameraPlatform>,
        config: CameraConfig,
        backend: Box<dyn DetectorBackend>,
    ) -> Result<Self> {
        let detector_config = config.detector.clone().unwrap_or_default();
        let adapter = DetectorAdapter::new(backend, detector_config)?;
        Ok(Self::build(platform, config, Some(adapter)))
    }

    fn build(
        platform: Arc<dyn CameraPlatform>,
        config: CameraConfig,
        detector: Option<DetectorAdapter>,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                platform,
                config,
                shared: Mutex::new(Shared {
                    state: LifecycleState::Uninitialized,
                    device: None,
                    request: None,
                    targets: Vec::new(),
                    session: None,
                    pipeline: None,
                    detector,
                    stats: Arc::new(IngestStats::default()),
                }),
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Counters for the current (or most recent) session.
    pub fn stats(&self) -> IngestSnapshot {
        let stats = Arc::clone(&self.inner.lock().stats);
        stats.snapshot()
    }

    /// Open the configured device and start the repeating capture into
    /// `surface` and the internal reader.
    ///
    /// A controller that is already running rejects the call with
    /// [`CameraError::AlreadyStarted`]; stop first to reconfigure. On any
    /// failure every handle allocated so far is released before returning.
    pub fn start(&self, surface: SurfaceHandle, frame_rate_hz: u32) -> Result<()> {
        if frame_rate_hz == 0 {
            return Err(CameraError::InvalidConfiguration(
                "frame rate must be non-zero".to_string(),
            ));
        }
        let mut shared = self.inner.lock();
        if !shared.state.accepts_start() {
            return Err(CameraError::AlreadyStarted);
        }

        match ControllerInner::configure(&self.inner, &mut shared, surface, frame_rate_hz) {
            Ok(()) => {
                shared.state = LifecycleState::Streaming;
                info!(rate_hz = frame_rate_hz, "camera session streaming");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "start failed; releasing partial session");
                self.inner.teardown(shared);
                Err(err)
            }
        }
    }

    /// Stop streaming and release every resource from the current attempt.
    ///
    /// Safe to call from any state, any number of times.
    pub fn stop(&self) {
        let mut shared = self.inner.lock();
        match shared.state {
            LifecycleState::Uninitialized | LifecycleState::Closed => {
                shared.state = LifecycleState::Closed;
                return;
            }
            // Another thread is already tearing down.
            LifecycleState::Closing => return,
            _ => {}
        }
        info!(state = ?shared.state, "stopping camera session");
        self.inner.teardown(shared);
    }
}

impl Drop for DeviceSessionController {
    fn drop(&mut self) {
        self.stop();
    }
}
