#[cfg(feature = "ffmpeg")]
mod ve_ffmpeg;

pub mod pixel;

#[cfg(feature = "ffmpeg")]
pub use ve_ffmpeg::{FfmpegBackend, FfmpegVideoEncoder};

pub use pixel::{FrameData, PixelFormat};

use derive_setters::Setters;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum EncoderError {
    #[error("Invalid encoder configuration: {0}")]
    InvalidConfig(String),

    #[error("Fail to find {0:?} encoder")]
    CodecNotFound(Codec),

    #[error("Fail to init codec: {0}")]
    InitCodec(String),

    #[error("Fail to open codec: {0}")]
    OpenCodec(String),

    #[error("Fail to init output context: {0}")]
    OutputContext(String),

    #[error("Fail to add video stream: {0}")]
    AddStream(String),

    #[error("Fail to write header: {0}")]
    WriteHeader(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Fail to convert frame for video: {0}")]
    ConvertFrame(String),

    #[error("Fail to prepare video frame for writing: {0}")]
    PrepareFrame(String),

    #[error("Fail to send frame to the encoder: {0}")]
    SendFrame(String),

    #[error("Fail to flush the encoder: {0}")]
    Flush(String),

    #[error("Fail to receive packet from the encoder: {0}")]
    ReceivePacket(String),

    #[error("Fail to write video data to file: {0}")]
    WritePacket(String),

    #[error("Fail to write video stream trailer: {0}")]
    WriteTrailer(String),

    #[error("Fail to flush trailing video data to file: {0}")]
    CloseFile(String),
}

pub type Result<T> = std::result::Result<T, EncoderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    H264,
    Hevc,
}

/// Speed/quality tradeoff passed to x264/x265 style encoders.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    #[default]
    Default,
    Placebo,
    Veryslow,
    Slower,
    Slow,
    Medium,
    Fast,
    Faster,
    Veryfast,
    Superfast,
    Ultrafast,
}

impl Preset {
    /// `None` leaves the encoder's own default untouched.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Preset::Default => None,
            Preset::Placebo => Some("placebo"),
            Preset::Veryslow => Some("veryslow"),
            Preset::Slower => Some("slower"),
            Preset::Slow => Some("slow"),
            Preset::Medium => Some("medium"),
            Preset::Fast => Some("fast"),
            Preset::Faster => Some("faster"),
            Preset::Veryfast => Some("veryfast"),
            Preset::Superfast => Some("superfast"),
            Preset::Ultrafast => Some("ultrafast"),
        }
    }
}

/// Result of polling the encoder for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStatus {
    /// A packet is buffered and can be written with [`VideoEncoder::write_packet`].
    Ready,
    /// The encoder needs more input.
    WouldBlock,
    /// The encoder is fully drained.
    Eof,
}

/// One open encode/mux session: an encoder context bound to an output file.
///
/// Implementations own the reusable destination frame and the pixel
/// converter. Calls arrive from a single thread.
pub trait VideoEncoder {
    fn config(&self) -> &EncoderConfig;

    /// Number of threads the codec was opened with.
    fn thread_count(&self) -> usize;

    /// Converts `frame` into the destination frame used by the next [`send_frame`](Self::send_frame).
    fn load_frame(&mut self, frame: &FrameData<'_>) -> Result<()>;

    /// Submits the loaded destination frame with presentation timestamp `pts`.
    fn send_frame(&mut self, pts: i64) -> Result<()>;

    /// Signals end of stream so buffered packets can be drained.
    fn send_eof(&mut self) -> Result<()>;

    fn receive_packet(&mut self) -> Result<PacketStatus>;

    /// Writes the packet obtained by the last `Ready` from [`receive_packet`](Self::receive_packet).
    fn write_packet(&mut self) -> Result<()>;

    fn write_trailer(&mut self) -> Result<()>;

    /// Flushes and closes the output file. Safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

/// Creates [`VideoEncoder`]s. Moved onto the recorder's worker thread.
pub trait EncoderBackend: Send {
    fn open(&self, config: &EncoderConfig) -> Result<Box<dyn VideoEncoder>>;
}

impl<F> EncoderBackend for F
where
    F: Fn(&EncoderConfig) -> Result<Box<dyn VideoEncoder>> + Send,
{
    fn open(&self, config: &EncoderConfig) -> Result<Box<dyn VideoEncoder>> {
        self(config)
    }
}

#[derive(Clone, Debug, Setters)]
#[setters(prefix = "with_")]
pub struct EncoderConfig {
    pub path: PathBuf,
    pub codec: Codec,
    pub width: u32,
    pub height: u32,
    pub ten_bit: bool,
    pub fps: u32,

    /// CRF-like constant quality value.
    #[setters(strip_option)]
    pub quality: Option<u32>,
    pub preset: Preset,
    pub threads: usize,
}

impl EncoderConfig {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            codec: Codec::H264,
            width,
            height,
            ten_bit: false,
            fps: 30,
            quality: None,
            preset: Preset::Default,
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    /// Encoder dimensions: YUV 4:2:0 needs even width and height.
    pub fn even_dimensions(&self) -> (u32, u32) {
        (self.width & !1, self.height & !1)
    }

    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.even_dimensions();
        if width == 0 || height == 0 {
            return Err(EncoderError::InvalidConfig(format!(
                "frame size {}x{} is too small",
                self.width, self.height
            )));
        }

        if self.fps == 0 {
            return Err(EncoderError::InvalidConfig("fps must not be 0".to_string()));
        }

        if self.path.as_os_str().is_empty() {
            return Err(EncoderError::InvalidConfig(
                "output path is empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_dimensions() {
        let config = EncoderConfig::new("a.mp4", 641, 481);
        assert_eq!(config.even_dimensions(), (640, 480));

        let config = EncoderConfig::new("a.mp4", 640, 480);
        assert_eq!(config.even_dimensions(), (640, 480));
    }

    #[test]
    fn test_validate() {
        assert!(EncoderConfig::new("a.mp4", 640, 480).validate().is_ok());
        assert!(EncoderConfig::new("a.mp4", 1, 480).validate().is_err());
        assert!(EncoderConfig::new("", 640, 480).validate().is_err());
        assert!(
            EncoderConfig::new("a.mp4", 640, 480)
                .with_fps(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_preset_names() {
        assert_eq!(Preset::Default.as_str(), None);
        assert_eq!(Preset::Veryslow.as_str(), Some("veryslow"));
        assert_eq!(Preset::Ultrafast.as_str(), Some("ultrafast"));
    }

    #[test]
    fn test_closure_backend() {
        let backend = |config: &EncoderConfig| -> Result<Box<dyn VideoEncoder>> {
            Err(EncoderError::CodecNotFound(config.codec))
        };

        let err = backend
            .open(&EncoderConfig::new("a.mp4", 640, 480).with_codec(Codec::Hevc))
            .err();
        assert!(matches!(err, Some(EncoderError::CodecNotFound(Codec::Hevc))));
    }
}
