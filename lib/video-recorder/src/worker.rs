use crate::{
    FrameId,
    screenshot::save_screenshot,
    session::EncodeSession,
    stats::StatsCounters,
    task::{FrameTask, StartTask, StopTask, Task, TaskQueue},
};
use std::{
    any::Any,
    fmt::Display,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    sync::{
        Arc, Condvar, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
};
use video_encoder::EncoderBackend;

/// Lock or condition variable failure. There is no way to recover the queue.
pub(crate) fn fatal(context: &str, error: impl Display) -> ! {
    log::error!("System error occurred while {context}: {error}");
    std::process::abort()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

#[derive(Default)]
pub(crate) struct QueueState {
    pub tasks: TaskQueue,
    pub shutdown: bool,

    /// The worker is executing a task it popped.
    pub busy: bool,

    /// Abort the open session at the next opportunity.
    pub discard_session: bool,

    /// Screenshot paths of cancelled frames, waiting for the next sample.
    pub returned_screenshots: Vec<PathBuf>,
}

impl QueueState {
    /// Nothing runs and nothing can run until the producer resolves a frame.
    fn is_idle(&self) -> bool {
        !self.busy && !self.discard_session && self.tasks.is_blocked()
    }
}

#[derive(Default)]
pub(crate) struct Shared {
    state: Mutex<QueueState>,
    event: Condvar,
    next_frame_id: AtomicU64,
    pub stats: StatsCounters,
}

impl Shared {
    pub fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|e| fatal("locking the task queue", e))
    }

    pub fn notify(&self) {
        self.event.notify_all();
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, QueueState>) -> MutexGuard<'a, QueueState> {
        self.event
            .wait(guard)
            .unwrap_or_else(|e| fatal("waiting for the task queue", e))
    }

    /// Blocks until the worker has nothing it can run.
    pub fn wait_idle(&self) {
        let guard = self.lock();
        let _guard = self
            .event
            .wait_while(guard, |state| !state.is_idle())
            .unwrap_or_else(|e| fatal("waiting for the task queue", e));
    }

    pub fn next_frame_id(&self) -> FrameId {
        FrameId(self.next_frame_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Drops all queued work and asks the worker to abort the open session.
    pub fn discard(&self) {
        let mut state = self.lock();
        let count = state.tasks.clear();
        state.discard_session = true;
        self.notify();

        if count > 0 {
            log::warn!("Discarded {count} queued task(s).");
        }
    }
}

/// The single thread that owns the encode session and runs queued tasks.
pub(crate) struct Worker {
    shared: Arc<Shared>,
    backend: Box<dyn EncoderBackend>,
    session: Option<EncodeSession>,
}

impl Worker {
    pub fn spawn(
        shared: Arc<Shared>,
        backend: Box<dyn EncoderBackend>,
    ) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("video-recorder".to_string())
            .spawn(move || {
                Worker {
                    shared,
                    backend,
                    session: None,
                }
                .run()
            })
    }

    fn run(mut self) {
        let shared = self.shared.clone();
        let mut state = shared.lock();

        loop {
            if state.discard_session {
                state.discard_session = false;
                drop(state);

                self.abort_session();

                state = shared.lock();
                continue;
            }

            if state.shutdown {
                break;
            }

            match state.tasks.pop_ready() {
                Some(task) => {
                    state.busy = true;
                    drop(state);

                    if let Err(payload) =
                        panic::catch_unwind(AssertUnwindSafe(|| self.execute(task)))
                    {
                        log::error!(
                            "Video recorder task panicked: {}.",
                            panic_message(payload.as_ref())
                        );

                        self.abort_session();
                    }

                    state = shared.lock();
                    state.busy = false;
                }
                None => {
                    shared.notify();
                    state = shared.wait(state);
                }
            }
        }

        let leftover = state.tasks.clear();
        drop(state);

        if leftover > 0 {
            log::warn!("Discarding {leftover} task(s) blocked by unresolved frames.");
        }

        if let Some(session) = self.session.take() {
            log::warn!(
                "Closing video record \"{}\" on shutdown.",
                session.path().display()
            );
            self.finish(session);
        }

        log::info!("video recorder worker exit");
    }

    fn execute(&mut self, task: Task) {
        match task {
            Task::Frame(task) => self.run_frame(task),
            Task::Start(task) => self.run_start(task),
            Task::Stop(task) => self.run_stop(task),
        }
    }

    fn run_frame(&mut self, task: FrameTask) {
        let stats = &self.shared.stats;
        let data = task.source.frame_data();

        if data.pixels.is_none() {
            log::warn!("Invalid frame occurred. Skipping it.");

            for path in &task.screenshot_paths {
                log::error!(
                    "Fail to save screenshot \"{}\": frame has no pixel data.",
                    path.display()
                );
            }

            StatsCounters::add(&stats.screenshots_failed, task.screenshot_paths.len() as u64);
            StatsCounters::add(&stats.frames_dropped, task.pending_frames);
            return;
        }

        for path in &task.screenshot_paths {
            log::info!("Saving screenshot \"{}\"...", path.display());

            match save_screenshot(&data, path) {
                Ok(()) => {
                    log::info!("Screenshot \"{}\" has been saved.", path.display());
                    StatsCounters::add(&stats.screenshots_saved, 1);
                }
                Err(e) => {
                    log::error!("Fail to save screenshot \"{}\": {e}.", path.display());
                    StatsCounters::add(&stats.screenshots_failed, 1);
                }
            }
        }

        if task.pending_frames == 0 {
            return;
        }

        let Some(session) = self.session.as_mut() else {
            log::debug!(
                "no open video record session, dropping {} frame(s)",
                task.pending_frames
            );
            StatsCounters::add(&stats.frames_dropped, task.pending_frames);
            return;
        };

        let before = session.frames_written();
        let result = session.encode(&data, task.pending_frames);
        let encoded = session.frames_written() - before;

        StatsCounters::add(&stats.frames_encoded, encoded);
        StatsCounters::add(&stats.frames_duplicated, encoded.saturating_sub(1));

        if let Err(e) = result {
            log::error!("{e}.");
            StatsCounters::add(&stats.frames_dropped, task.pending_frames - encoded);

            self.abort_session();
        }
    }

    fn run_start(&mut self, task: StartTask) {
        if !task.matched_stop {
            log::warn!("Starting new video record session without stopping previous one.");
        }

        if let Some(session) = self.session.take() {
            self.finish(session);
        }

        let config = task.config.to_encoder_config();
        match EncodeSession::open(self.backend.as_ref(), &config) {
            Ok(session) => {
                log::info!(
                    "Recording video \"{}\" (using {} threads for encoding)...",
                    config.path.display(),
                    session.thread_count()
                );
                StatsCounters::add(&self.shared.stats.sessions_opened, 1);
                self.session = Some(session);
            }
            Err(e) => {
                log::error!(
                    "Fail to start video record \"{}\": {e}.",
                    config.path.display()
                );
                StatsCounters::add(&self.shared.stats.sessions_failed, 1);
            }
        }
    }

    fn run_stop(&mut self, task: StopTask) {
        if !task.matched_start {
            log::warn!("Stopping video record without matched start.");
        }

        match self.session.take() {
            Some(session) => self.finish(session),
            None if task.matched_start => {
                log::warn!("No open video record session to stop.");
            }
            None => {}
        }
    }

    fn abort_session(&mut self) {
        if let Some(session) = self.session.take() {
            log::warn!("Aborting video record \"{}\".", session.path().display());
            session.abort();
        }
    }

    fn finish(&self, session: EncodeSession) {
        if session.finish() {
            StatsCounters::add(&self.shared.stats.sessions_finished, 1);
        }
    }
}
