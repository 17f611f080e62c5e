use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the caller side and the worker thread.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub samples: AtomicU64,
    pub frames_due: AtomicU64,
    pub frames_encoded: AtomicU64,
    pub frames_duplicated: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub frames_cancelled: AtomicU64,
    pub screenshots_saved: AtomicU64,
    pub screenshots_failed: AtomicU64,
    pub sessions_opened: AtomicU64,
    pub sessions_failed: AtomicU64,
    pub sessions_finished: AtomicU64,
}

impl StatsCounters {
    pub fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RecorderStats {
        let get = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        RecorderStats {
            samples: get(&self.samples),
            frames_due: get(&self.frames_due),
            frames_encoded: get(&self.frames_encoded),
            frames_duplicated: get(&self.frames_duplicated),
            frames_dropped: get(&self.frames_dropped),
            frames_cancelled: get(&self.frames_cancelled),
            screenshots_saved: get(&self.screenshots_saved),
            screenshots_failed: get(&self.screenshots_failed),
            sessions_opened: get(&self.sessions_opened),
            sessions_failed: get(&self.sessions_failed),
            sessions_finished: get(&self.sessions_finished),
        }
    }
}

/// Snapshot of the recorder counters, see [`VideoRecorder::stats`](crate::VideoRecorder::stats).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecorderStats {
    /// Frame requests handed to the producer and queued.
    pub samples: u64,
    /// Sum of the pending video frame counts of those requests.
    pub frames_due: u64,
    /// Frames pushed through the encoder, duplicates included.
    pub frames_encoded: u64,
    /// Encoder pushes that replayed an already encoded buffer.
    pub frames_duplicated: u64,
    /// Due frames never encoded: no open session, invalid buffer or encode failure.
    pub frames_dropped: u64,
    /// Frame requests cancelled before they ran.
    pub frames_cancelled: u64,
    pub screenshots_saved: u64,
    pub screenshots_failed: u64,
    pub sessions_opened: u64,
    pub sessions_failed: u64,
    /// Sessions closed with header, trailer and file flushed.
    pub sessions_finished: u64,
}
