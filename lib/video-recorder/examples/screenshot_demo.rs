use std::convert::Infallible;
use video_recorder::{
    EncoderConfig, EncoderError, FrameRequest, OwnedFrame, RecordConfig, VideoEncoder,
    VideoRecorder, screenshot_extensions,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // screenshots need no codec
    let backend = |config: &EncoderConfig| -> Result<Box<dyn VideoEncoder>, EncoderError> {
        Err(EncoderError::CodecNotFound(config.codec))
    };
    let mut recorder = VideoRecorder::new(backend)?;

    let dir = std::env::temp_dir();
    for ext in screenshot_extensions().chain(["xyz"]) {
        recorder.screenshot(RecordConfig::make_screenshot_filename(&dir, ext));
    }

    let handle = recorder.sample_frame(|request: &FrameRequest| {
        for path in request.screenshot_paths() {
            log::info!("screenshot requested: {}", path.display());
        }
        Ok::<_, Infallible>(OwnedFrame::solid_bgra(200, 100, [255, 128, 0, 255]))
    });

    if let Some(handle) = handle {
        handle.ready();
    }

    recorder.wait_idle();
    log::info!("{:#?}", recorder.stats());

    Ok(())
}
