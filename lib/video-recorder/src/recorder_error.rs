use thiserror::Error;

/// Errors of the recording engine.
///
/// Asynchronous failures never reach the caller of
/// [`VideoRecorder`](crate::VideoRecorder) methods; they are logged by the
/// worker thread or by the retry policy. Only [`VideoRecorder::new`](crate::VideoRecorder::new)
/// returns one directly.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Video encoding failed: {0}")]
    VideoEncodingFailed(#[from] video_encoder::EncoderError),

    #[error("Image processing failed: {0}")]
    ImageProcessingFailed(#[from] image::ImageError),

    #[error("Queue operation failed: {0}")]
    QueueError(#[from] std::collections::TryReserveError),

    #[error("Frame request failed: {0}")]
    FrameRequestFailed(String),

    #[error("Worker thread failed: {0}")]
    WorkerFailed(String),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
