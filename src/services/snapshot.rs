//! Snapshot encoding

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbaImage};

use crate::errors::{BridgeResult, MapError};
use crate::models::SnapshotFormat;

/// Encode a captured frame and return it as unwrapped base64
///
/// `quality` (0-100) applies to JPEG only; PNG is lossless.
pub fn encode_snapshot(image: &RgbaImage, format: SnapshotFormat, quality: u8) -> BridgeResult<String> {
    let mut bytes = Vec::new();
    match format {
        SnapshotFormat::Png => image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| MapError::snapshot_failed(format!("PNG encoding failed: {e}")))?,
        SnapshotFormat::Jpeg => {
            let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
            rgb.write_with_encoder(encoder)
                .map_err(|e| MapError::snapshot_failed(format!("JPEG encoding failed: {e}")))?;
        }
    }
    Ok(STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn frame() -> RgbaImage {
        RgbaImage::from_fn(32, 16, |x, y| Rgba([(x * 8) as u8, (y * 16) as u8, 128, 255]))
    }

    #[test]
    fn test_png_snapshot_decodes_back() {
        let encoded = encode_snapshot(&frame(), SnapshotFormat::Png, 100).unwrap();
        assert!(!encoded.contains('\n'));
        let bytes = STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!(decoded.to_rgba8(), frame());
    }

    #[test]
    fn test_jpeg_quality_affects_size() {
        let low = encode_snapshot(&frame(), SnapshotFormat::Jpeg, 5).unwrap();
        let high = encode_snapshot(&frame(), SnapshotFormat::Jpeg, 100).unwrap();
        assert!(low.len() < high.len());

        let bytes = STANDARD.decode(high).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }
}
