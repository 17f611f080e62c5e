use crate::{
    FrameHandle, FrameRequest, FrameSource, RecordConfig, RecordMode, RecorderError,
    RecorderStats, Result,
    pacing::Pacer,
    retry::{Status, with_retry},
    stats::StatsCounters,
    task::{FrameTask, StartTask, StopTask, Task},
    worker::{Shared, Worker},
};
use std::{
    collections::VecDeque,
    fmt::Display,
    path::PathBuf,
    sync::Arc,
    thread::JoinHandle,
    time::Instant,
};
use video_encoder::EncoderBackend;

/// State touched only by the thread calling into [`VideoRecorder`].
#[derive(Default)]
struct CallerState {
    mode: RecordMode,

    /// Anchored when the session starts, `None` while stopped.
    pacer: Option<Pacer>,

    /// Paths queued by `screenshot` since the last sample.
    screenshot_paths: VecDeque<PathBuf>,
}

impl CallerState {
    fn restore_screenshots(&mut self, paths: Vec<PathBuf>) {
        for path in paths.into_iter().rev() {
            self.screenshot_paths.push_front(path);
        }
    }

    /// Frames due at `now`, zero when not recording.
    fn advance(&mut self, now: Instant) -> u64 {
        match (self.mode.is_recording(), self.pacer.as_mut()) {
            (true, Some(pacer)) => pacer.advance(now),
            _ => 0,
        }
    }

    fn try_sample<F, S, E>(
        &mut self,
        shared: &Arc<Shared>,
        now: Instant,
        callback: &mut F,
    ) -> Result<Option<FrameHandle>>
    where
        F: FnMut(&FrameRequest) -> std::result::Result<S, E>,
        S: FrameSource,
        E: Display,
    {
        let backup = self.pacer;
        let pending_frames = self.advance(now);

        if pending_frames == 0 && self.screenshot_paths.is_empty() {
            return Ok(None);
        }

        let request = FrameRequest {
            pending_frames,
            screenshot_paths: self.screenshot_paths.drain(..).collect(),
        };

        match submit_frame(shared, request, callback) {
            Ok(handle) => {
                StatsCounters::add(&shared.stats.samples, 1);
                StatsCounters::add(&shared.stats.frames_due, pending_frames);
                Ok(Some(handle))
            }
            Err((e, request)) => {
                self.pacer = backup;
                self.restore_screenshots(request.screenshot_paths);
                Err(e)
            }
        }
    }
}

fn submit_frame<F, S, E>(
    shared: &Arc<Shared>,
    request: FrameRequest,
    callback: &mut F,
) -> std::result::Result<FrameHandle, (RecorderError, FrameRequest)>
where
    F: FnMut(&FrameRequest) -> std::result::Result<S, E>,
    S: FrameSource,
    E: Display,
{
    let source = match callback(&request) {
        Ok(source) => source,
        Err(e) => {
            return Err((RecorderError::FrameRequestFailed(e.to_string()), request));
        }
    };

    let id = shared.next_frame_id();
    let mut state = shared.lock();
    if let Err(e) = state.tasks.reserve(1) {
        return Err((e.into(), request));
    }

    state.tasks.push(Task::Frame(FrameTask {
        id,
        source: Box::new(source),
        screenshot_paths: request.screenshot_paths,
        pending_frames: request.pending_frames,
        ready: false,
    }));
    shared.notify();

    Ok(FrameHandle::new(id, shared))
}

/// Samples producer frames, records them to a video file and saves screenshots.
///
/// Every method returns immediately: encoding and file I/O run on a dedicated
/// worker thread named `video-recorder`, in the order the calls were made.
/// Failures on that thread are logged and never reported back to the caller.
///
/// ```ignore
/// use video_recorder::{OwnedFrame, RecordConfig, VideoRecorder};
///
/// # fn main() -> video_recorder::Result<()> {
/// let mut recorder = VideoRecorder::with_ffmpeg()?;
/// recorder.start_record(RecordConfig::new("out.mp4", 640, 480));
///
/// for _ in 0..90 {
///     let handle = recorder.sample_frame(|_request| {
///         Ok::<_, std::convert::Infallible>(OwnedFrame::solid_bgra(640, 480, [0, 0, 255, 255]))
///     });
///     if let Some(handle) = handle {
///         handle.ready();
///     }
///     std::thread::sleep(std::time::Duration::from_millis(16));
/// }
///
/// recorder.stop_record();
/// # Ok(())
/// # }
/// ```
pub struct VideoRecorder {
    shared: Arc<Shared>,
    caller: CallerState,
    worker: Option<JoinHandle<()>>,
}

impl VideoRecorder {
    pub fn new(backend: impl EncoderBackend + 'static) -> Result<Self> {
        let shared = Arc::new(Shared::default());
        let worker = Worker::spawn(shared.clone(), Box::new(backend))
            .map_err(|e| RecorderError::WorkerFailed(e.to_string()))?;

        Ok(Self {
            shared,
            caller: CallerState::default(),
            worker: Some(worker),
        })
    }

    /// A recorder encoding through FFmpeg.
    #[cfg(feature = "ffmpeg")]
    pub fn with_ffmpeg() -> Result<Self> {
        Self::new(video_encoder::FfmpegBackend)
    }

    pub fn record_mode(&self) -> RecordMode {
        self.caller.mode
    }

    pub fn stats(&self) -> RecorderStats {
        self.shared.stats.snapshot()
    }

    /// Blocks until every queued task that can run has run.
    ///
    /// Frames whose handles are still unresolved, and the tasks behind them,
    /// stay queued.
    pub fn wait_idle(&self) {
        self.shared.wait_idle();
    }

    /// [`sample_frame_at`](Self::sample_frame_at) with the current time.
    pub fn sample_frame<F, S, E>(&mut self, callback: F) -> Option<FrameHandle>
    where
        F: FnMut(&FrameRequest) -> std::result::Result<S, E>,
        S: FrameSource,
        E: Display,
    {
        self.sample_frame_at(Instant::now(), callback)
    }

    /// Called by the producer on every tick.
    ///
    /// When a video frame is due at `now` or screenshots are waiting,
    /// `callback` is asked for the frame and a task is queued for it. The
    /// returned handle must be resolved once the frame's pixels are in place.
    /// Returns `None` when nothing is due or the request failed twice.
    pub fn sample_frame_at<F, S, E>(&mut self, now: Instant, mut callback: F) -> Option<FrameHandle>
    where
        F: FnMut(&FrameRequest) -> std::result::Result<S, E>,
        S: FrameSource,
        E: Display,
    {
        let returned = std::mem::take(&mut self.shared.lock().returned_screenshots);
        self.caller.restore_screenshots(returned);

        let (shared, caller) = (&self.shared, &mut self.caller);
        with_retry(shared, "Fail to request frame", Status::Retry, || {
            caller.try_sample(shared, now, &mut callback)
        })
        .flatten()
    }

    /// [`start_record_at`](Self::start_record_at) with the current time.
    pub fn start_record(&mut self, config: RecordConfig) {
        self.start_record_at(Instant::now(), config);
    }

    /// Starts a new recording session whose first frame is due at `now`.
    ///
    /// A session that is still recording is stopped first. Samples taken
    /// later than `now` receive every frame that fell due in between.
    pub fn start_record_at(&mut self, now: Instant, config: RecordConfig) {
        let was_recording = self.caller.mode.is_recording();
        self.caller.mode = RecordMode::from(config.fps);
        self.caller.pacer = Some(Pacer::new(now, config.fps.to_u32()));

        let shared = &self.shared;
        with_retry(shared, "Fail to start video record", Status::Retry, || {
            let mut state = shared.lock();
            state.tasks.reserve(2)?;

            if was_recording {
                state.tasks.push(Task::Stop(StopTask {
                    matched_start: true,
                }));
            }

            state.tasks.push(Task::Start(StartTask {
                config: config.clone(),
                matched_stop: !was_recording,
            }));

            shared.notify();
            Ok(())
        });
    }

    pub fn stop_record(&mut self) {
        let matched_start = self.caller.mode.is_recording();
        self.caller.mode = RecordMode::Stopped;
        self.caller.pacer = None;

        let shared = &self.shared;
        with_retry(shared, "Fail to stop video record", Status::Clean, || {
            let mut state = shared.lock();
            state.tasks.reserve(1)?;
            state.tasks.push(Task::Stop(StopTask { matched_start }));

            shared.notify();
            Ok(())
        });
    }

    /// Saves the next sampled frame to `path`.
    ///
    /// The format follows the file extension, see [`screenshot_format`](crate::screenshot_format).
    pub fn screenshot(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();

        let paths = &mut self.caller.screenshot_paths;
        with_retry(&self.shared, "Fail to queue screenshot", Status::Retry, || {
            paths.try_reserve(1)?;
            paths.push_back(path.clone());
            Ok(())
        });
    }
}

impl Drop for VideoRecorder {
    fn drop(&mut self) {
        if self.caller.mode.is_recording() {
            self.shared.wait_idle();
            log::warn!("Destroying video recorder without stopping current record session.");
            self.stop_record();
        }

        self.shared.wait_idle();

        {
            let mut state = self.shared.lock();
            state.shutdown = true;
            self.shared.notify();
        }

        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::error!("Video recorder worker thread panicked.");
        }

        let dropped = self.caller.screenshot_paths.len();
        if dropped > 0 {
            log::warn!("Dropping {dropped} screenshot(s) never attached to a frame.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OwnedFrame;
    use std::{convert::Infallible, time::Duration};
    use video_encoder::{EncoderConfig, EncoderError, VideoEncoder};

    fn recorder() -> VideoRecorder {
        let backend = |_: &EncoderConfig| -> video_encoder::Result<Box<dyn VideoEncoder>> {
            Err(EncoderError::InitCodec("no codec in unit tests".to_string()))
        };
        VideoRecorder::new(backend).unwrap()
    }

    fn frame(_: &FrameRequest) -> std::result::Result<OwnedFrame, Infallible> {
        Ok(OwnedFrame::solid_bgra(2, 2, [0, 0, 0, 255]))
    }

    #[test]
    fn test_nothing_due_when_stopped() {
        let mut recorder = recorder();

        assert!(recorder.sample_frame(frame).is_none());
        assert_eq!(recorder.stats().samples, 0);
    }

    #[test]
    fn test_mode_follows_calls() {
        let mut recorder = recorder();
        assert_eq!(recorder.record_mode(), RecordMode::Stopped);

        recorder.start_record(RecordConfig::new("a.mp4", 64, 48).with_fps(crate::FPS::Fps60));
        assert_eq!(recorder.record_mode(), RecordMode::HighFps);

        recorder.start_record(RecordConfig::new("b.mp4", 64, 48));
        assert_eq!(recorder.record_mode(), RecordMode::LowFps);

        recorder.stop_record();
        assert_eq!(recorder.record_mode(), RecordMode::Stopped);

        recorder.wait_idle();
        assert_eq!(recorder.stats().sessions_failed, 2);
    }

    #[test]
    fn test_pending_frames_follow_clock() {
        let mut recorder = recorder();
        let t0 = Instant::now();
        recorder.start_record_at(t0, RecordConfig::new("a.mp4", 64, 48));

        let mut pending = vec![];
        for offset in [0, 10, 40, 140] {
            let now = t0 + Duration::from_millis(offset);
            let handle = recorder.sample_frame_at(now, |request: &FrameRequest| {
                pending.push(request.pending_frames());
                frame(request)
            });

            if let Some(handle) = handle {
                handle.ready();
            }
        }

        // 0ms: frame 0, 10ms: nothing due, 40ms: frame 1, 140ms: frames 2..=4
        assert_eq!(pending, vec![1, 1, 3]);
        assert_eq!(recorder.stats().frames_due, 5);
    }

    #[test]
    fn test_clock_starts_at_start_record() {
        let mut recorder = recorder();
        let t0 = Instant::now();
        recorder.start_record_at(t0, RecordConfig::new("a.mp4", 64, 48));

        let mut pending = vec![];
        for offset in [100, 110] {
            let now = t0 + Duration::from_millis(offset);
            let handle = recorder.sample_frame_at(now, |request: &FrameRequest| {
                pending.push(request.pending_frames());
                frame(request)
            });

            if let Some(handle) = handle {
                handle.ready();
            }
        }

        // frames 0..=3 fell due before the first sample, frame 4 is due at 133ms
        assert_eq!(pending, vec![4]);
        assert_eq!(recorder.stats().frames_due, 4);
    }

    #[test]
    fn test_restart_reanchors_clock() {
        let mut recorder = recorder();
        let t0 = Instant::now();
        recorder.start_record_at(t0, RecordConfig::new("a.mp4", 64, 48));
        recorder.stop_record();

        let t1 = t0 + Duration::from_secs(5);
        recorder.start_record_at(t1, RecordConfig::new("b.mp4", 64, 48));

        let mut pending = 0;
        let handle = recorder.sample_frame_at(t1 + Duration::from_millis(40), |request: &FrameRequest| {
            pending = request.pending_frames();
            frame(request)
        });
        if let Some(handle) = handle {
            handle.ready();
        }

        assert_eq!(pending, 2);
    }

    #[test]
    fn test_failed_callback_keeps_screenshots() {
        let mut recorder = recorder();
        recorder.screenshot("a.png");
        recorder.screenshot("b.png");

        let mut calls = 0;
        let handle = recorder.sample_frame(|_: &FrameRequest| -> std::result::Result<OwnedFrame, &'static str> {
            calls += 1;
            Err("no buffer")
        });
        assert!(handle.is_none());
        assert_eq!(calls, 2);

        let mut seen = vec![];
        let handle = recorder.sample_frame(|request: &FrameRequest| {
            seen = request.screenshot_paths().to_vec();
            Err::<OwnedFrame, _>("still no buffer")
        });
        assert!(handle.is_none());
        assert_eq!(seen, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
        assert_eq!(recorder.stats().samples, 0);
    }
}
