use crate::{
    stats::StatsCounters,
    worker::Shared,
};
use std::{
    path::PathBuf,
    sync::{Arc, Weak},
};
use video_encoder::{FrameData, PixelFormat};

/// A producer frame whose pixels stay valid as long as the value lives.
///
/// The recorder owns the source from the moment it is returned by the
/// request callback until its task runs or is cancelled, which is how the
/// buffer outlives the worker's access to it.
pub trait FrameSource: Send + 'static {
    fn frame_data(&self) -> FrameData<'_>;
}

/// A frame that owns its pixel buffer.
#[derive(Debug, Clone)]
pub struct OwnedFrame {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub pixels: Option<Vec<u8>>,
}

impl OwnedFrame {
    /// Tightly packed rows.
    pub fn new(format: PixelFormat, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            format,
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            pixels: Some(pixels),
        }
    }

    /// A frame without a buffer; the worker skips it.
    pub fn empty(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            pixels: None,
            ..Self::new(format, width, height, vec![])
        }
    }

    /// Single-color B8G8R8A8 frame.
    pub fn solid_bgra(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let pixels = bgra.repeat(width as usize * height as usize);
        Self::new(PixelFormat::B8G8R8A8, width, height, pixels)
    }
}

impl FrameSource for OwnedFrame {
    fn frame_data(&self) -> FrameData<'_> {
        FrameData {
            format: self.format,
            width: self.width,
            height: self.height,
            stride: self.stride,
            pixels: self.pixels.as_deref(),
        }
    }
}

/// Identity of one queued frame task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub(crate) u64);

/// What the recorder wants from the upcoming producer buffer.
#[derive(Debug, Clone, Default)]
pub struct FrameRequest {
    pub(crate) pending_frames: u64,
    pub(crate) screenshot_paths: Vec<PathBuf>,
}

impl FrameRequest {
    /// Video frames to encode from this single buffer, zero if only screenshots are due.
    pub fn pending_frames(&self) -> u64 {
        self.pending_frames
    }

    /// Screenshots to save from this buffer, in the order they were requested.
    pub fn screenshot_paths(&self) -> &[PathBuf] {
        &self.screenshot_paths
    }
}

/// Producer side of a sampled frame.
///
/// The task queued for this frame blocks the worker until [`ready`](Self::ready)
/// is called. [`cancel`](Self::cancel) removes it instead. Dropping an
/// unresolved handle cancels the frame.
///
/// The handle only keeps a weak reference to the recorder: resolving it
/// after the recorder is gone does nothing.
#[derive(Debug)]
pub struct FrameHandle {
    id: FrameId,
    shared: Weak<Shared>,
    resolved: bool,
}

impl FrameHandle {
    pub(crate) fn new(id: FrameId, shared: &Arc<Shared>) -> Self {
        Self {
            id,
            shared: Arc::downgrade(shared),
            resolved: false,
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    /// The buffer is filled; the worker may process the frame.
    pub fn ready(mut self) {
        self.resolve(false);
    }

    /// Drops the frame task if it has not run yet.
    ///
    /// Screenshots attached to the frame are handed to the next sampled frame.
    pub fn cancel(mut self) {
        self.resolve(true);
    }

    fn resolve(&mut self, cancel: bool) {
        if self.resolved {
            return;
        }
        self.resolved = true;

        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let mut state = shared.lock();
        if cancel {
            if let Some(task) = state.tasks.remove_frame(self.id) {
                log::debug!("frame {:?} cancelled", self.id);

                StatsCounters::add(&shared.stats.frames_cancelled, 1);
                StatsCounters::add(&shared.stats.frames_dropped, task.pending_frames);
                state.returned_screenshots.extend(task.screenshot_paths);
            }
        } else if !state.tasks.set_ready(self.id) {
            log::debug!("frame {:?} is no longer queued", self.id);
        }

        shared.notify();
    }
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        if !self.resolved {
            log::debug!("frame {:?} dropped without being resolved", self.id);
            self.resolve(true);
        }
    }
}
