//! PNG encoding for rendered frames.

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};

use crate::{FrameImage, RenderError};

/// Encodes a frame as an RGBA8 PNG.
///
/// Uses fixed encoder settings so identical frames always produce identical files.
pub fn encode_png(frame: &FrameImage) -> Result<Vec<u8>, RenderError> {
    let expected = (frame.width as usize)
        .checked_mul(frame.height as usize)
        .and_then(|px| px.checked_mul(4));
    if expected != Some(frame.pixels.len()) {
        return Err(RenderError::BufferSize {
            width: frame.width,
            height: frame.height,
        });
    }

    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut out, CompressionType::Default, FilterType::Adaptive);
    encoder.write_image(&frame.pixels, frame.width, frame.height, ExtendedColorType::Rgba8)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(index: u32) -> FrameImage {
        let mut pixels = Vec::new();
        for y in 0..8u32 {
            for x in 0..8u32 {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
        FrameImage {
            index,
            width: 8,
            height: 8,
            pixels,
        }
    }

    #[test]
    fn encodes_png_signature_and_is_stable() {
        let a = encode_png(&checker(0)).unwrap();
        let b = encode_png(&checker(0)).unwrap();
        assert_eq!(&a[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_short_buffer() {
        let mut frame = checker(0);
        frame.pixels.pop();
        assert!(matches!(
            encode_png(&frame),
            Err(RenderError::BufferSize { width: 8, height: 8 })
        ));
    }
}
