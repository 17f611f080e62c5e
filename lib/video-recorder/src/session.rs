use crate::{RecorderError, Result};
use std::path::Path;
use video_encoder::{EncoderBackend, EncoderConfig, FrameData, PacketStatus, VideoEncoder};

/// An open video file plus the timestamp of the next frame written to it.
pub(crate) struct EncodeSession {
    encoder: Box<dyn VideoEncoder>,
    next_pts: i64,
}

impl EncodeSession {
    pub fn open(backend: &dyn EncoderBackend, config: &EncoderConfig) -> Result<Self> {
        config.validate()?;

        let encoder = backend.open(config)?;
        Ok(Self {
            encoder,
            next_pts: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.encoder.config().path
    }

    pub fn thread_count(&self) -> usize {
        self.encoder.thread_count()
    }

    pub fn frames_written(&self) -> u64 {
        self.next_pts as u64
    }

    /// Converts `frame` once and submits it `count` times with consecutive timestamps.
    pub fn encode(&mut self, frame: &FrameData<'_>, count: u64) -> Result<()> {
        self.encoder.load_frame(frame)?;

        for _ in 0..count {
            self.encoder.send_frame(self.next_pts)?;
            self.next_pts += 1;
            self.drain()?;
        }

        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        loop {
            match self.encoder.receive_packet()? {
                PacketStatus::Ready => self.encoder.write_packet()?,
                PacketStatus::WouldBlock | PacketStatus::Eof => return Ok(()),
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.encoder.send_eof()?;
        self.drain()?;
        self.encoder.write_trailer()?;
        Ok(())
    }

    /// Flushes the encoder, writes the trailer and closes the file.
    ///
    /// The file is closed even if flushing failed. Returns whether every step succeeded.
    pub fn finish(mut self) -> bool {
        let flushed = self.flush();
        let closed = self.encoder.close().map_err(RecorderError::from);

        match flushed.and(closed) {
            Ok(()) => {
                log::info!("Video has been recorded.");
                true
            }
            Err(e) => {
                log::error!("{e}.");
                log::error!("Fail to record video.");
                false
            }
        }
    }

    /// Closes the file without flushing buffered packets.
    pub fn abort(mut self) {
        if let Err(e) = self.encoder.close() {
            log::warn!("{e}.");
        }
        log::warn!("Video record has been aborted.");
    }
}
