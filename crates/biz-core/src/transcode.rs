//! Transcoder: decode any supported image format, re-encode as baseline JPEG.
//!
//! The input format is detected from the content (magic bytes), never from
//! the URL or a Content-Type header. Alpha channels are dropped; output is
//! always 8-bit RGB so it can be embedded in a PDF as DeviceRGB.

use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

/// Lowest accepted JPEG quality.
pub const MIN_QUALITY: u8 = 1;
/// Highest accepted JPEG quality.
pub const MAX_QUALITY: u8 = 100;

#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Bytes are not an image in any format the decoder recognizes.
    #[error("undecodable image: {0}")]
    Undecodable(#[source] image::ImageError),

    /// Decoded fine but the JPEG encoder refused it (e.g. zero-sized image).
    #[error("JPEG encode failed: {0}")]
    Encode(#[source] image::ImageError),
}

/// JPEG bytes plus the pixel size, which packaging uses as PDF page size.
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Clamp `quality` into `MIN_QUALITY..=MAX_QUALITY`.
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_QUALITY, MAX_QUALITY)
}

/// Decode `bytes` and re-encode as JPEG at `quality` (clamped to 1-100).
pub fn transcode(bytes: &[u8], quality: u8) -> Result<Transcoded, TranscodeError> {
    let decoded = image::load_from_memory(bytes).map_err(TranscodeError::Undecodable)?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut out = Vec::with_capacity(bytes.len() / 2);
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, clamp_quality(quality));
        encoder.encode_image(&rgb).map_err(TranscodeError::Encode)?;
    }

    Ok(Transcoded {
        bytes: out,
        width,
        height,
    })
}

/// Encode a small gradient PNG; shared by tests across the crate.
#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 128, 200])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}
