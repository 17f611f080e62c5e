use crate::FPS;
use std::time::{Duration, Instant};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Which pacing clock governs sampling.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    #[default]
    Stopped,
    LowFps,
    HighFps,
}

impl RecordMode {
    pub fn fps(&self) -> Option<u32> {
        match self {
            RecordMode::Stopped => None,
            RecordMode::LowFps => Some(FPS::Fps30.to_u32()),
            RecordMode::HighFps => Some(FPS::Fps60.to_u32()),
        }
    }

    pub fn is_recording(&self) -> bool {
        !matches!(self, RecordMode::Stopped)
    }
}

impl From<FPS> for RecordMode {
    fn from(fps: FPS) -> Self {
        match fps {
            FPS::Fps30 => RecordMode::LowFps,
            FPS::Fps60 => RecordMode::HighFps,
        }
    }
}

/// Converts monotonic time into a number of video frames to emit.
///
/// Deadline `i` is `anchor + i / fps`, computed from the index each time so
/// that no rounding error accumulates across frames.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pacer {
    anchor: Instant,
    fps: u32,
    next_index: u64,
}

impl Pacer {
    /// The first frame is due at `now`.
    pub fn new(now: Instant, fps: u32) -> Self {
        assert!(fps > 0);

        Self {
            anchor: now,
            fps,
            next_index: 0,
        }
    }

    fn deadline(&self, index: u64) -> Instant {
        let nanos = index as u128 * NANOS_PER_SEC / self.fps as u128;
        self.anchor + Duration::from_nanos(nanos as u64)
    }

    pub fn next_deadline(&self) -> Instant {
        self.deadline(self.next_index)
    }

    /// Returns how many frames became due at `now` and moves the deadline past `now`.
    ///
    /// Zero when the next deadline has not been reached. Otherwise the count is
    /// the whole intervals elapsed since the deadline plus one, so a slow
    /// caller replays one buffer into several output frames.
    pub fn advance(&mut self, now: Instant) -> u64 {
        if now < self.next_deadline() {
            return 0;
        }

        // largest index whose deadline is not after `now`
        let elapsed = now.duration_since(self.anchor).as_nanos();
        let reached = ((elapsed + 1) * self.fps as u128 - 1) / NANOS_PER_SEC;
        let reached = reached as u64;

        let pending = reached.saturating_sub(self.next_index) + 1;
        self.next_index += pending;
        pending
    }
}
