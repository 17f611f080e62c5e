use chrono::Local;
use derive_setters::Setters;
use std::path::{Path, PathBuf};
use video_encoder::{Codec, EncoderConfig, Preset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FPS {
    Fps30,
    Fps60,
}

impl FPS {
    pub fn to_u32(&self) -> u32 {
        match self {
            FPS::Fps30 => 30,
            FPS::Fps60 => 60,
        }
    }
}

/// Parameters of one recording session, passed to
/// [`VideoRecorder::start_record`](crate::VideoRecorder::start_record).
///
/// ```
/// use video_recorder::{Codec, FPS, Preset, RecordConfig};
///
/// let config = RecordConfig::new("a.mp4", 1920, 1080)
///     .with_fps(FPS::Fps60)
///     .with_codec(Codec::Hevc)
///     .with_quality(23)
///     .with_preset(Preset::Fast);
/// assert_eq!(config.to_encoder_config().fps, 60);
/// ```
#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct RecordConfig {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,

    /// Encode 10-bit YUV instead of 8-bit.
    pub ten_bit: bool,
    pub fps: FPS,
    pub codec: Codec,

    #[setters(strip_option)]
    pub quality: Option<u32>,
    pub preset: Preset,

    /// Encoder threads, defaults to the available parallelism.
    #[setters(strip_option)]
    pub threads: Option<usize>,
}

impl RecordConfig {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
            ten_bit: false,
            fps: FPS::Fps30,
            codec: Codec::H264,
            quality: None,
            preset: Preset::Default,
            threads: None,
        }
    }

    pub fn to_encoder_config(&self) -> EncoderConfig {
        let mut config = EncoderConfig::new(self.path.clone(), self.width, self.height)
            .with_codec(self.codec)
            .with_ten_bit(self.ten_bit)
            .with_fps(self.fps.to_u32())
            .with_preset(self.preset);

        config.quality = self.quality;
        if let Some(threads) = self.threads {
            config.threads = threads;
        }

        config
    }

    pub fn make_filename(dir: impl AsRef<Path>) -> PathBuf {
        let mut filename = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        filename.push_str(".mp4");
        dir.as_ref().to_path_buf().join(filename)
    }

    pub fn make_screenshot_filename(dir: impl AsRef<Path>, extension: &str) -> PathBuf {
        let filename = Local::now().format("%Y-%m-%d_%H-%M-%S%.3f").to_string();
        dir.as_ref()
            .to_path_buf()
            .join(format!("{filename}.{}", extension.trim_start_matches('.')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_encoder_config() {
        let config = RecordConfig::new("out.mp4", 641, 480)
            .with_ten_bit(true)
            .with_fps(FPS::Fps60)
            .with_quality(18)
            .with_threads(3)
            .to_encoder_config();

        assert_eq!(config.path, PathBuf::from("out.mp4"));
        assert_eq!(config.even_dimensions(), (640, 480));
        assert!(config.ten_bit);
        assert_eq!(config.fps, 60);
        assert_eq!(config.quality, Some(18));
        assert_eq!(config.threads, 3);
    }

    #[test]
    fn test_make_filename() {
        let path = RecordConfig::make_filename("/tmp");
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp4"));
        assert!(path.starts_with("/tmp"));

        let path = RecordConfig::make_screenshot_filename("/tmp", ".png");
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
    }
}
