//! Zero-copy access to one delivered image buffer.

use std::slice;
use std::sync::Arc;

use crate::common::StreamConfig;
use crate::error::{CameraError, Result};
use crate::platform::{BufferHandle, CameraPlatform, ReaderHandle};

/// Index of the luminance plane in the supported stream format.
const LUMINANCE_PLANE: usize = 0;

/// One buffer checked out of the reader's pool.
///
/// The pool is shallow, so the buffer must go back promptly: it is released
/// on drop, which covers every exit path of the frame callback. A buffer
/// that is never released stalls the stream once the pool is exhausted.
pub struct AcquiredBuffer {
    platform: Arc<dyn CameraPlatform>,
    reader: ReaderHandle,
    buffer: BufferHandle,
}

impl AcquiredBuffer {
    pub(crate) fn new(
        platform: Arc<dyn CameraPlatform>,
        reader: ReaderHandle,
        buffer: BufferHandle,
    ) -> Self {
        Self {
            platform,
            reader,
            buffer,
        }
    }

    /// Map the luminance plane as a [`FrameBufferView`].
    ///
    /// Dimensions come from the configured stream, not from the buffer; the
    /// platform guarantees plane geometry matches the negotiated
    /// configuration. The view borrows this buffer and cannot outlive it.
    pub fn luminance_view(&self, config: &StreamConfig) -> Result<FrameBufferView<'_>> {
        let format = self.platform.buffer_format(self.buffer)?;
        if format != config.format {
            return Err(CameraError::UnsupportedFormat(format));
        }

        let plane = self.platform.plane(self.buffer, LUMINANCE_PLANE)?;
        if plane.data.is_null() {
            return Err(CameraError::FrameAcquisitionFailed(
                "null luminance plane".to_string(),
            ));
        }
        let width = config.width as usize;
        let height = config.height as usize;
        let min_len = plane.row_stride * height.saturating_sub(1) + width;
        if plane.len < min_len {
            return Err(CameraError::FrameAcquisitionFailed(format!(
                "luminance plane too short: {} < {}",
                plane.len, min_len
            )));
        }

        // Plane memory belongs to the pool and stays mapped until this
        // buffer is released; the view's borrow of `self` keeps the release
        // from happening first.
        let data = unsafe { slice::from_raw_parts(plane.data, plane.len) };
        Ok(FrameBufferView::new(
            config.width,
            config.height,
            plane.row_stride,
            data,
        ))
    }
}

impl Drop for AcquiredBuffer {
    fn drop(&mut self) {
        self.platform.release_buffer(self.reader, self.buffer);
    }
}

/// Zero-copy descriptor over one luminance image.
#[derive(Clone, Copy)]
pub struct FrameBufferView<'a> {
    width: u32,
    height: u32,
    row_stride: usize,
    data: &'a [u8],
}

impl<'a> FrameBufferView<'a> {
    pub(crate) fn new(width: u32, height: u32, row_stride: usize, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            row_stride,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Raw plane bytes, including any per-row padding.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Pixels of row `y`, stride padding stripped.
    pub fn row(&self, y: u32) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.row_stride;
        let end = start + self.width as usize;
        self.data.get(start..end)
    }
}
