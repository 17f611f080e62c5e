use crate::{RecorderError, Result};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use std::path::Path;
use video_encoder::{
    FrameData, PixelFormat,
    pixel::{r10g10b10a2_to_rgba16, to_rgba8},
};

const FALLBACK_EXTENSION: &str = "tga";

const FORMATS: &[(&str, ImageFormat)] = &[
    ("bmp", ImageFormat::Bmp),
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("gif", ImageFormat::Gif),
    ("ico", ImageFormat::Ico),
    ("tga", ImageFormat::Tga),
    ("webp", ImageFormat::WebP),
];

/// Extensions accepted by [`save_screenshot`], lower case.
pub fn screenshot_extensions() -> impl Iterator<Item = &'static str> {
    FORMATS.iter().map(|(ext, _)| *ext)
}

/// Image format chosen by the extension of `path`, case-insensitive.
///
/// Unknown or missing extensions fall back to TGA; the file keeps its name.
pub fn screenshot_format(path: &Path) -> ImageFormat {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();

    match FORMATS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(ext))
    {
        Some((_, format)) => *format,
        None => {
            log::warn!(
                "Unrecognized screenshot format \"{}\". Using \"{FALLBACK_EXTENSION}\" as fallback.",
                path.display()
            );
            ImageFormat::Tga
        }
    }
}

fn supports_16_bit(format: ImageFormat) -> bool {
    matches!(format, ImageFormat::Png | ImageFormat::Tiff)
}

fn to_image(frame: &FrameData<'_>, format: ImageFormat) -> Result<DynamicImage> {
    let (width, height) = (frame.width, frame.height);
    let size_error = || {
        RecorderError::FrameRequestFailed(format!("pixel buffer does not match {width}x{height}"))
    };

    let image = if frame.format == PixelFormat::R10G10B10A2 && supports_16_bit(format) {
        let img: ImageBuffer<Rgba<u16>, Vec<u16>> =
            ImageBuffer::from_raw(width, height, r10g10b10a2_to_rgba16(frame)?)
                .ok_or_else(size_error)?;
        DynamicImage::ImageRgba16(img)
    } else {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_raw(width, height, to_rgba8(frame)?).ok_or_else(size_error)?;
        DynamicImage::ImageRgba8(img)
    };

    // no alpha channel in JPEG
    if format == ImageFormat::Jpeg {
        return Ok(DynamicImage::ImageRgb8(image.to_rgb8()));
    }

    Ok(image)
}

/// Writes one frame to `path` in the format picked by its extension.
///
/// 10-bit frames keep 16 bits per channel in PNG and TIFF and are narrowed to
/// 8 bits elsewhere.
pub fn save_screenshot(frame: &FrameData<'_>, path: &Path) -> Result<()> {
    let format = screenshot_format(path);
    let image = to_image(frame, format)?;
    image.save_with_format(path, format)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FrameSource, OwnedFrame};

    fn pack(r: u32, g: u32, b: u32, a: u32) -> [u8; 4] {
        (r | (g << 10) | (b << 20) | (a << 30)).to_le_bytes()
    }

    #[test]
    fn test_screenshot_format() {
        assert_eq!(screenshot_format(Path::new("a.png")), ImageFormat::Png);
        assert_eq!(screenshot_format(Path::new("a.JPG")), ImageFormat::Jpeg);
        assert_eq!(screenshot_format(Path::new("a.Tiff")), ImageFormat::Tiff);
        assert_eq!(screenshot_format(Path::new("a.xyz")), ImageFormat::Tga);
        assert_eq!(screenshot_format(Path::new("noext")), ImageFormat::Tga);
        assert_eq!(screenshot_extensions().count(), 10);
    }

    #[test]
    fn test_save_png_swaps_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let frame = OwnedFrame::solid_bgra(4, 3, [10, 20, 30, 255]);

        save_screenshot(&frame.frame_data(), &path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(img.get_pixel(2, 1).0, [30, 20, 10, 255]);
    }

    #[test]
    fn test_save_with_padded_stride() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padded.png");

        let mut pixels = vec![0u8; 2 * 12];
        pixels[12..16].copy_from_slice(&[1, 2, 3, 255]);
        let frame = OwnedFrame {
            stride: 12,
            ..OwnedFrame::new(PixelFormat::B8G8R8A8, 2, 2, pixels)
        };

        save_screenshot(&frame.frame_data(), &path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 1).0, [3, 2, 1, 255]);
    }

    #[test]
    fn test_unknown_extension_writes_tga() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.xyz");
        let frame = OwnedFrame::solid_bgra(2, 2, [0, 0, 255, 255]);

        save_screenshot(&frame.frame_data(), &path).unwrap();

        let img = image::load(
            std::io::BufReader::new(std::fs::File::open(&path).unwrap()),
            ImageFormat::Tga,
        )
        .unwrap();
        assert_eq!(img.to_rgba8().get_pixel(1, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_jpeg_drops_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.JPEG");
        let frame = OwnedFrame::solid_bgra(8, 8, [0, 0, 0, 128]);

        save_screenshot(&frame.frame_data(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_ten_bit_png_keeps_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let frame = OwnedFrame::new(PixelFormat::R10G10B10A2, 1, 1, pack(1023, 512, 0, 3).to_vec());

        save_screenshot(&frame.frame_data(), &path).unwrap();

        let img = image::open(&path).unwrap();
        assert!(matches!(img, DynamicImage::ImageRgba16(_)));
        assert_eq!(img.to_rgba16().get_pixel(0, 0).0, [0xffff, 0x8020, 0, 0xffff]);
    }

    #[test]
    fn test_missing_pixels_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let frame = OwnedFrame::empty(PixelFormat::B8G8R8A8, 2, 2);

        assert!(save_screenshot(&frame.frame_data(), &path).is_err());
        assert!(!path.exists());
    }
}
