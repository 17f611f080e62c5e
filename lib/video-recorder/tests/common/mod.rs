#![allow(dead_code)]

use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use video_recorder::{
    EncoderBackend, EncoderConfig, EncoderError, FrameData, PacketStatus, VideoEncoder,
};

type EncoderResult<T> = std::result::Result<T, EncoderError>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(PathBuf),
    Load,
    Send(i64),
    Write(i64),
    Eof,
    Trailer,
    Close,
}

/// Everything the mock encoders did, shared with the test.
#[derive(Default)]
pub struct MockState {
    events: Mutex<Vec<Event>>,
    open: AtomicUsize,
    max_open: AtomicUsize,
    pub fail_open: AtomicBool,
    pub fail_send: AtomicBool,
}

impl MockState {
    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn max_open_sessions(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }
}

pub struct MockBackend(Arc<MockState>);

impl MockBackend {
    pub fn new() -> (Self, Arc<MockState>) {
        let state = Arc::new(MockState::default());
        (Self(state.clone()), state)
    }
}

impl EncoderBackend for MockBackend {
    fn open(&self, config: &EncoderConfig) -> EncoderResult<Box<dyn VideoEncoder>> {
        if self.0.fail_open.load(Ordering::SeqCst) {
            return Err(EncoderError::OpenCodec("mock codec unavailable".to_string()));
        }

        let open = self.0.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_open.fetch_max(open, Ordering::SeqCst);
        self.0.push(Event::Open(config.path.clone()));

        Ok(Box::new(MockEncoder {
            state: self.0.clone(),
            config: config.clone(),
            buffered: VecDeque::new(),
            ready: None,
            eof: false,
            closed: false,
        }))
    }
}

/// Keeps one packet in flight like a real encoder with lookahead.
struct MockEncoder {
    state: Arc<MockState>,
    config: EncoderConfig,
    buffered: VecDeque<i64>,
    ready: Option<i64>,
    eof: bool,
    closed: bool,
}

impl VideoEncoder for MockEncoder {
    fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn thread_count(&self) -> usize {
        self.config.threads
    }

    fn load_frame(&mut self, frame: &FrameData<'_>) -> EncoderResult<()> {
        frame.checked_pixels()?;
        self.state.push(Event::Load);
        Ok(())
    }

    fn send_frame(&mut self, pts: i64) -> EncoderResult<()> {
        if self.state.fail_send.load(Ordering::SeqCst) {
            return Err(EncoderError::SendFrame("mock encoder rejected frame".to_string()));
        }

        self.state.push(Event::Send(pts));
        self.buffered.push_back(pts);
        Ok(())
    }

    fn send_eof(&mut self) -> EncoderResult<()> {
        self.state.push(Event::Eof);
        self.eof = true;
        Ok(())
    }

    fn receive_packet(&mut self) -> EncoderResult<PacketStatus> {
        let in_flight = if self.eof { 0 } else { 1 };

        if self.buffered.len() > in_flight {
            self.ready = self.buffered.pop_front();
            Ok(PacketStatus::Ready)
        } else if self.eof {
            Ok(PacketStatus::Eof)
        } else {
            Ok(PacketStatus::WouldBlock)
        }
    }

    fn write_packet(&mut self) -> EncoderResult<()> {
        if let Some(pts) = self.ready.take() {
            self.state.push(Event::Write(pts));
        }
        Ok(())
    }

    fn write_trailer(&mut self) -> EncoderResult<()> {
        self.state.push(Event::Trailer);
        Ok(())
    }

    fn close(&mut self) -> EncoderResult<()> {
        if !self.closed {
            self.closed = true;
            self.state.open.fetch_sub(1, Ordering::SeqCst);
            self.state.push(Event::Close);
        }
        Ok(())
    }
}
