//! Frame-ingest pipeline between the platform buffer reader and the
//! detector.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::common::{IngestStats, StreamConfig};
use crate::detector::DetectorAdapter;
use crate::error::Result;
use crate::frame::AcquiredBuffer;
use crate::platform::{BufferListener, CameraPlatform, ReaderHandle, SurfaceHandle};

/// Per-session ingest path.
///
/// The platform invokes the registered buffer listener once per delivered
/// frame, on a thread it owns. The session controller funnels those
/// invocations through its lock into [`FrameIngestPipeline::process_available`],
/// so at most one frame is in flight at any instant; a slow detector simply
/// delays release of that one buffer, which is the backpressure mechanism.
pub struct FrameIngestPipeline {
    platform: Arc<dyn CameraPlatform>,
    config: StreamConfig,
    reader: Option<ReaderHandle>,
    stats: Arc<IngestStats>,
}

impl FrameIngestPipeline {
    /// Create the backing reader. Returns the pipeline and the surface the
    /// capture session must target to feed it.
    pub(crate) fn new(
        platform: Arc<dyn CameraPlatform>,
        config: StreamConfig,
    ) -> Result<(Self, SurfaceHandle)> {
        let reader = platform.create_reader(&config)?;
        let surface = match platform.reader_surface(reader) {
            Ok(surface) => surface,
            Err(err) => {
                platform.delete_reader(reader);
                return Err(err);
            }
        };
        Ok((
            Self {
                platform,
                config,
                reader: Some(reader),
                stats: Arc::new(IngestStats::default()),
            },
            surface,
        ))
    }

    pub(crate) fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    pub(crate) fn register_listener(&self, listener: BufferListener) -> Result<()> {
        match self.reader {
            Some(reader) => self.platform.set_buffer_listener(reader, listener),
            None => Ok(()),
        }
    }

    /// Detach the platform listener. Idempotent.
    pub(crate) fn unregister_listener(&self) {
        if let Some(reader) = self.reader {
            self.platform.clear_buffer_listener(reader);
        }
    }

    /// Delete the backing reader. Idempotent.
    pub(crate) fn shutdown(&mut self) {
        if let Some(reader) = self.reader.take() {
            self.platform.delete_reader(reader);
        }
    }

    /// Drain the most recent buffer, if any.
    ///
    /// Every failure here is per-frame: logged, counted, dropped. The
    /// session state machine never sees it.
    pub(crate) fn process_available(&mut self, detector: Option<&mut DetectorAdapter>) {
        if let Err(err) = self.ingest_one(detector) {
            self.stats.record_dropped();
            warn!(error = %err, "frame skipped");
        }
    }

    fn ingest_one(&mut self, detector: Option<&mut DetectorAdapter>) -> Result<()> {
        let Some(reader) = self.reader else {
            return Ok(());
        };
        let Some(handle) = self.platform.acquire_latest(reader)? else {
            // Racing the producer can drain the pool; the next callback
            // will have a buffer again.
            debug!("buffer-ready with an empty pool");
            return Ok(());
        };

        // `buffer` goes back to the pool when it drops, on every path out
        // of this function including the `?` exits below.
        let buffer = AcquiredBuffer::new(Arc::clone(&self.platform), reader, handle);
        let view = buffer.luminance_view(&self.config)?;
        if let Some(detector) = detector {
            let (detections, elapsed) = detector.detect(&view)?;
            self.stats.record_detect(detections.len(), elapsed);
        }
        self.stats.record_processed();
        Ok(())
    }
}

impl Drop for FrameIngestPipeline {
    fn drop(&mut self) {
        self.unregister_listener();
        self.shutdown();
    }
}
