use super::{
    Codec, EncoderBackend, EncoderConfig, EncoderError, FrameData, PacketStatus, PixelFormat,
    Result, VideoEncoder, pixel,
};
use ffmpeg_next::{
    Dictionary, Packet, Rational, codec, encoder, format, frame, software::scaling,
    util::error::EAGAIN,
};

/// Opens [`FfmpegVideoEncoder`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegBackend;

impl EncoderBackend for FfmpegBackend {
    fn open(&self, config: &EncoderConfig) -> Result<Box<dyn VideoEncoder>> {
        Ok(Box::new(FfmpegVideoEncoder::new(config)?))
    }
}

type ScalerKey = (format::Pixel, u32, u32);

struct Scaler {
    key: ScalerKey,
    context: scaling::Context,
    src_frame: frame::Video,
}

pub struct FfmpegVideoEncoder {
    config: EncoderConfig,
    encoder: encoder::Video,
    output: format::context::Output,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    dst_frame: frame::Video,
    packet: Packet,
    scaler: Option<Scaler>,
    closed: bool,
}

fn find_encoder(codec: Codec) -> Option<ffmpeg_next::Codec> {
    match codec {
        Codec::H264 => encoder::find(codec::Id::H264),
        Codec::Hevc => encoder::find(codec::Id::HEVC),
    }
}

impl FfmpegVideoEncoder {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        config.validate()?;

        ffmpeg_next::init().map_err(|e| {
            EncoderError::InitCodec(format!("Failed to initialize ffmpeg: {e}"))
        })?;

        let codec = find_encoder(config.codec).ok_or(EncoderError::CodecNotFound(config.codec))?;

        let mut output = format::output(&config.path)
            .map_err(|e| EncoderError::OutputContext(format!("{}: {e}", config.path.display())))?;
        let global_header = output
            .format()
            .flags()
            .contains(format::flag::Flags::GLOBAL_HEADER);

        let mut video = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| EncoderError::InitCodec(e.to_string()))?;

        let (width, height) = config.even_dimensions();
        let pixel_format = if config.ten_bit {
            format::Pixel::YUV420P10LE
        } else {
            format::Pixel::YUV420P
        };
        let time_base = Rational::new(1, config.fps as i32);

        video.set_width(width);
        video.set_height(height);
        video.set_format(pixel_format);
        video.set_time_base(time_base);
        video.set_frame_rate(Some(Rational::new(config.fps as i32, 1)));
        if config.threads > 0 {
            video.set_threading(codec::threading::Config::count(config.threads));
        }
        if global_header {
            video.set_flags(codec::flag::Flags::GLOBAL_HEADER);
        }

        let mut opts = Dictionary::new();
        if let Some(quality) = config.quality {
            opts.set("crf", &quality.to_string());
        }
        if let Some(preset) = config.preset.as_str() {
            opts.set("preset", preset);
        }

        let encoder = video.open_with(opts).map_err(|e| {
            EncoderError::OpenCodec(format!("{}: {e}", config.path.display()))
        })?;

        let stream_index = {
            let mut stream = output
                .add_stream(codec)
                .map_err(|e| EncoderError::AddStream(e.to_string()))?;
            stream.set_parameters(&encoder);
            stream.set_time_base(time_base);
            stream.index()
        };

        output.write_header().map_err(|e| {
            EncoderError::WriteHeader(format!("{}: {e}", config.path.display()))
        })?;

        // the muxer may pick its own time base while writing the header
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| EncoderError::AddStream("stream vanished after header".to_string()))?;

        log::debug!(
            "ffmpeg encoder opened: {:?} {width}x{height} {pixel_format:?} @ {} fps, stream time base {stream_time_base}",
            config.codec,
            config.fps,
        );

        Ok(Self {
            config: config.clone(),
            encoder,
            output,
            stream_index,
            encoder_time_base: time_base,
            stream_time_base,
            dst_frame: frame::Video::new(pixel_format, width, height),
            packet: Packet::empty(),
            scaler: None,
            closed: false,
        })
    }

    fn source_pixels(&self, frame: &FrameData<'_>) -> Result<(format::Pixel, Vec<u8>, usize)> {
        let width = frame.width as usize;
        match frame.format {
            PixelFormat::B8G8R8A8 => {
                let rows = frame.rows()?;
                let mut packed = Vec::with_capacity(frame.row_bytes() * frame.height as usize);
                for row in rows {
                    packed.extend_from_slice(row);
                }
                Ok((format::Pixel::BGRA, packed, width * 4))
            }
            PixelFormat::R10G10B10A2 if self.config.ten_bit => Ok((
                format::Pixel::RGBA64LE,
                pixel::r10g10b10a2_to_rgba64le(frame)?,
                width * 8,
            )),
            PixelFormat::R10G10B10A2 => {
                Ok((format::Pixel::BGRA, pixel::to_bgra8(frame)?, width * 4))
            }
        }
    }

    fn ensure_scaler(&mut self, key: ScalerKey) -> Result<()> {
        if self.scaler.as_ref().is_some_and(|scaler| scaler.key == key) {
            return Ok(());
        }

        let (src_format, src_width, src_height) = key;
        let context = scaling::Context::get(
            src_format,
            src_width,
            src_height,
            self.dst_frame.format(),
            self.dst_frame.width(),
            self.dst_frame.height(),
            scaling::Flags::BILINEAR,
        )
        .map_err(|e| EncoderError::ConvertFrame(e.to_string()))?;

        log::debug!(
            "pixel converter created: {src_format:?} {src_width}x{src_height} -> {:?} {}x{}",
            self.dst_frame.format(),
            self.dst_frame.width(),
            self.dst_frame.height()
        );

        self.scaler = Some(Scaler {
            key,
            context,
            src_frame: frame::Video::new(src_format, src_width, src_height),
        });

        Ok(())
    }
}

impl VideoEncoder for FfmpegVideoEncoder {
    fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn thread_count(&self) -> usize {
        self.encoder.threading().count
    }

    fn load_frame(&mut self, frame: &FrameData<'_>) -> Result<()> {
        let (src_format, packed, packed_stride) = self.source_pixels(frame)?;
        self.ensure_scaler((src_format, frame.width, frame.height))?;

        let ret = unsafe { ffmpeg_next::sys::av_frame_make_writable(self.dst_frame.as_mut_ptr()) };
        if ret < 0 {
            return Err(EncoderError::PrepareFrame(
                ffmpeg_next::Error::from(ret).to_string(),
            ));
        }

        let Some(scaler) = self.scaler.as_mut() else {
            return Err(EncoderError::ConvertFrame(
                "pixel converter missing".to_string(),
            ));
        };

        let stride = scaler.src_frame.stride(0);
        let data = scaler.src_frame.data_mut(0);
        for (y, row) in packed.chunks_exact(packed_stride).enumerate() {
            data[y * stride..y * stride + packed_stride].copy_from_slice(row);
        }

        scaler
            .context
            .run(&scaler.src_frame, &mut self.dst_frame)
            .map_err(|e| EncoderError::ConvertFrame(e.to_string()))
    }

    fn send_frame(&mut self, pts: i64) -> Result<()> {
        self.dst_frame.set_pts(Some(pts));
        self.encoder
            .send_frame(&self.dst_frame)
            .map_err(|e| EncoderError::SendFrame(e.to_string()))
    }

    fn send_eof(&mut self) -> Result<()> {
        self.encoder
            .send_eof()
            .map_err(|e| EncoderError::Flush(e.to_string()))
    }

    fn receive_packet(&mut self) -> Result<PacketStatus> {
        match self.encoder.receive_packet(&mut self.packet) {
            Ok(()) => Ok(PacketStatus::Ready),
            Err(ffmpeg_next::Error::Other { errno }) if errno == EAGAIN => {
                Ok(PacketStatus::WouldBlock)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(PacketStatus::Eof),
            Err(e) => Err(EncoderError::ReceivePacket(e.to_string())),
        }
    }

    fn write_packet(&mut self) -> Result<()> {
        self.packet
            .rescale_ts(self.encoder_time_base, self.stream_time_base);
        self.packet.set_stream(self.stream_index);
        self.packet
            .write_interleaved(&mut self.output)
            .map_err(|e| EncoderError::WritePacket(e.to_string()))
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.output
            .write_trailer()
            .map_err(|e| EncoderError::WriteTrailer(e.to_string()))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let ret = unsafe { ffmpeg_next::sys::avio_closep(&mut (*self.output.as_mut_ptr()).pb) };
        if ret < 0 {
            return Err(EncoderError::CloseFile(
                ffmpeg_next::Error::from(ret).to_string(),
            ));
        }

        Ok(())
    }
}
