use std::{
    convert::Infallible,
    thread,
    time::{Duration, Instant},
};
use video_recorder::{FPS, FrameRequest, OwnedFrame, RecordConfig, VideoRecorder};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

// moving vertical bar on a dark background
fn render(tick: u32) -> OwnedFrame {
    let mut frame = OwnedFrame::solid_bgra(WIDTH, HEIGHT, [32, 24, 16, 255]);
    let bar = (tick * 8) % WIDTH;

    if let Some(pixels) = frame.pixels.as_mut() {
        for row in pixels.chunks_exact_mut(frame.stride) {
            for x in bar..(bar + 40).min(WIDTH) {
                let i = x as usize * 4;
                row[i..i + 4].copy_from_slice(&[0, 200, 255, 255]);
            }
        }
    }

    frame
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = RecordConfig::new(RecordConfig::make_filename("/tmp"), WIDTH, HEIGHT)
        .with_fps(FPS::Fps60)
        .with_quality(23);
    log::info!("Recording configuration: {:#?}", config);

    let mut recorder = VideoRecorder::with_ffmpeg()?;
    recorder.start_record(config);
    recorder.screenshot(RecordConfig::make_screenshot_filename("/tmp", "png"));

    let start = Instant::now();
    let mut tick = 0;
    while start.elapsed() < Duration::from_secs(3) {
        let handle = recorder.sample_frame(|request: &FrameRequest| {
            if request.pending_frames() > 1 {
                log::debug!("{} frames due for tick {tick}", request.pending_frames());
            }
            Ok::<_, Infallible>(render(tick))
        });

        if let Some(handle) = handle {
            handle.ready();
        }

        tick += 1;
        thread::sleep(Duration::from_millis(10));
    }

    recorder.stop_record();
    recorder.wait_idle();

    log::info!("{:#?}", recorder.stats());
    Ok(())
}
