//! Source pixel formats and helpers that unpack them into packed RGBA.

use crate::{EncoderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8 bits per channel, bytes ordered B, G, R, A.
    B8G8R8A8,
    /// Little-endian 32-bit words: R in bits 0..10, G in 10..20, B in 20..30, A in 30..32.
    R10G10B10A2,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        4
    }
}

/// A borrowed view of one producer frame.
///
/// `pixels` is `None` when the producer has no buffer for this frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameData<'a> {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of two consecutive rows.
    pub stride: usize,
    pub pixels: Option<&'a [u8]>,
}

impl<'a> FrameData<'a> {
    /// Returns the pixel slice after checking it covers `height` rows of `stride` bytes.
    pub fn checked_pixels(&self) -> Result<&'a [u8]> {
        let pixels = self
            .pixels
            .ok_or_else(|| EncoderError::InvalidFrame("frame has no pixel data".to_string()))?;

        if self.width == 0 || self.height == 0 {
            return Err(EncoderError::InvalidFrame(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }

        let row_bytes = self.row_bytes();
        if self.stride < row_bytes {
            return Err(EncoderError::InvalidFrame(format!(
                "stride {} is smaller than row size {row_bytes}",
                self.stride
            )));
        }

        let needed = self
            .stride
            .checked_mul(self.height as usize - 1)
            .and_then(|n| n.checked_add(row_bytes));

        match needed {
            Some(needed) if pixels.len() >= needed => {}
            Some(needed) => {
                return Err(EncoderError::InvalidFrame(format!(
                    "buffer holds {} bytes, {needed} needed for {}x{} with stride {}",
                    pixels.len(),
                    self.width,
                    self.height,
                    self.stride
                )));
            }
            None => {
                return Err(EncoderError::InvalidFrame(format!(
                    "frame size {}x{} with stride {} overflows",
                    self.width, self.height, self.stride
                )));
            }
        }

        Ok(pixels)
    }

    /// Bytes of pixel data in one row, without padding.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Iterates the rows of the frame, padding excluded.
    pub fn rows(&self) -> Result<impl Iterator<Item = &'a [u8]>> {
        let pixels = self.checked_pixels()?;
        let (stride, row_bytes) = (self.stride, self.row_bytes());

        Ok((0..self.height as usize).map(move |y| &pixels[y * stride..y * stride + row_bytes]))
    }
}

/// Unpacks one R10G10B10A2 word into 10-bit R, G, B and 2-bit A.
pub fn unpack_r10g10b10a2(word: u32) -> [u16; 4] {
    [
        (word & 0x3ff) as u16,
        ((word >> 10) & 0x3ff) as u16,
        ((word >> 20) & 0x3ff) as u16,
        (word >> 30) as u16,
    ]
}

fn widen_10_to_16(v: u16) -> u16 {
    (v << 6) | (v >> 4)
}

fn widen_2_to_16(v: u16) -> u16 {
    v * 0x5555
}

fn narrow_10_to_8(v: u16) -> u8 {
    (v >> 2) as u8
}

fn narrow_2_to_8(v: u16) -> u8 {
    (v * 0x55) as u8
}

fn r10g10b10a2_words(frame: &FrameData<'_>) -> Result<impl Iterator<Item = u32>> {
    if frame.format != PixelFormat::R10G10B10A2 {
        return Err(EncoderError::InvalidFrame(format!(
            "expected R10G10B10A2 frame, got {:?}",
            frame.format
        )));
    }

    Ok(frame.rows()?.flat_map(|row| {
        row.chunks_exact(4)
            .map(|px| u32::from_le_bytes([px[0], px[1], px[2], px[3]]))
    }))
}

/// Packed RGBA with 8 bits per channel, any source format.
pub fn to_rgba8(frame: &FrameData<'_>) -> Result<Vec<u8>> {
    frame.checked_pixels()?;
    let mut out = Vec::with_capacity(frame.row_bytes() * frame.height as usize);

    match frame.format {
        PixelFormat::B8G8R8A8 => {
            for row in frame.rows()? {
                for px in row.chunks_exact(4) {
                    out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                }
            }
        }
        PixelFormat::R10G10B10A2 => {
            for word in r10g10b10a2_words(frame)? {
                let [r, g, b, a] = unpack_r10g10b10a2(word);
                out.extend_from_slice(&[
                    narrow_10_to_8(r),
                    narrow_10_to_8(g),
                    narrow_10_to_8(b),
                    narrow_2_to_8(a),
                ]);
            }
        }
    }

    Ok(out)
}

/// Packed BGRA with 8 bits per channel, any source format.
pub fn to_bgra8(frame: &FrameData<'_>) -> Result<Vec<u8>> {
    let mut out = to_rgba8(frame)?;
    for px in out.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    Ok(out)
}

/// Packed RGBA with 16 bits per channel from an R10G10B10A2 frame.
pub fn r10g10b10a2_to_rgba16(frame: &FrameData<'_>) -> Result<Vec<u16>> {
    frame.checked_pixels()?;
    let mut out = Vec::with_capacity(frame.width as usize * frame.height as usize * 4);

    for word in r10g10b10a2_words(frame)? {
        let [r, g, b, a] = unpack_r10g10b10a2(word);
        out.extend_from_slice(&[
            widen_10_to_16(r),
            widen_10_to_16(g),
            widen_10_to_16(b),
            widen_2_to_16(a),
        ]);
    }

    Ok(out)
}

/// Same as [`r10g10b10a2_to_rgba16`] serialized as little-endian bytes (FFmpeg `RGBA64LE`).
pub fn r10g10b10a2_to_rgba64le(frame: &FrameData<'_>) -> Result<Vec<u8>> {
    Ok(r10g10b10a2_to_rgba16(frame)?
        .into_iter()
        .flat_map(u16::to_le_bytes)
        .collect())
}
