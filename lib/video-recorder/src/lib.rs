//! # Video Recorder Library
//!
//! Asynchronous frame recorder: samples producer frames at a fixed frame rate,
//! encodes them into a video file and saves screenshots, all on one worker
//! thread so the producer never blocks on codec or file I/O.
//!
//! ## Features
//!
//! - **Frame Pacing**: 30 or 60 fps with duplicate frames when the producer falls behind
//! - **Video Encoding**: H.264/HEVC in MP4 through FFmpeg (requires `ffmpeg` feature)
//! - **Screenshots**: PNG, JPEG, BMP, TIFF, GIF, ICO, TGA and WebP from any sampled frame
//! - **10-bit Sources**: R10G10B10A2 frames encoded as 10-bit video or 16-bit images
//!
//! ## Quick Start
//!
//! ```ignore
//! use video_recorder::{FPS, OwnedFrame, RecordConfig, VideoRecorder};
//!
//! let mut recorder = VideoRecorder::with_ffmpeg().unwrap();
//! let path = RecordConfig::make_filename("/tmp");
//! recorder.start_record(RecordConfig::new(path, 1920, 1080).with_fps(FPS::Fps60));
//! recorder.screenshot("/tmp/first.png");
//!
//! // once per rendered frame
//! if let Some(handle) = recorder.sample_frame(|request| {
//!     log::debug!("{} frame(s) due", request.pending_frames());
//!     Ok::<_, std::convert::Infallible>(OwnedFrame::solid_bgra(1920, 1080, [0, 0, 0, 255]))
//! }) {
//!     handle.ready();
//! }
//!
//! recorder.stop_record();
//! ```
//!
//! ## Architecture
//!
//! 1. **Caller side**: [`VideoRecorder`] tracks the record mode, paces samples
//!    and queues frame, start and stop tasks
//! 2. **Producer**: fills the frame and resolves its [`FrameHandle`]
//! 3. **Worker thread**: runs tasks in FIFO order, an unresolved frame blocks
//!    the tasks behind it
//!
//! ## Modules
//!
//! - `recorder`: Public recorder API
//! - `recorder_config`: Session configuration
//! - `frame`: Frame sources, requests and handles
//! - `screenshot`: Screenshot format selection and saving

mod frame;
mod pacing;
mod recorder;
mod recorder_config;
mod recorder_error;
mod retry;
mod screenshot;
mod session;
mod stats;
mod task;
mod worker;

pub use frame::{FrameHandle, FrameId, FrameRequest, FrameSource, OwnedFrame};
pub use pacing::RecordMode;
pub use recorder::VideoRecorder;
pub use recorder_config::{FPS, RecordConfig};
pub use recorder_error::{RecorderError, Result};
pub use screenshot::{save_screenshot, screenshot_extensions, screenshot_format};
pub use stats::RecorderStats;
pub use video_encoder::{
    Codec, EncoderBackend, EncoderConfig, EncoderError, FrameData, PacketStatus, PixelFormat,
    Preset, VideoEncoder,
};
