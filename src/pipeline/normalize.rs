use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

use crate::error::MarkError;
use crate::models::{MediaKind, Page, PagePayload, Submission};

/// Maximum pixel size of either raster dimension after normalization.
const MAX_DIMENSION: u32 = 1024;
/// JPEG quality used for re-encoding.
const JPEG_QUALITY: u8 = 85;

/// Canonicalize one uploaded page into a backend-acceptable payload.
///
/// Raster pages are downsampled to fit within [`MAX_DIMENSION`] preserving
/// aspect ratio, flattened to opaque RGB, and re-encoded as JPEG. Paginated
/// documents pass through unchanged. Unreadable input fails here, before any
/// backend call is made.
pub fn normalize_page(page: &Page) -> Result<PagePayload, MarkError> {
    match page.kind {
        MediaKind::Document => Ok(PagePayload {
            bytes: page.bytes.clone(),
            mime_type: "application/pdf".to_string(),
        }),
        MediaKind::Raster => {
            let decoded = image::load_from_memory(&page.bytes).map_err(|e| MarkError::Input {
                ordinal: page.ordinal,
                reason: format!("failed to decode image: {}", e),
            })?;

            let (width, height) = (decoded.width(), decoded.height());
            let resized = if width > MAX_DIMENSION || height > MAX_DIMENSION {
                debug!(
                    "Page {}: downsampling {}x{} to fit {}px",
                    page.ordinal, width, height, MAX_DIMENSION
                );
                decoded.thumbnail(MAX_DIMENSION, MAX_DIMENSION)
            } else {
                decoded
            };

            // Flattens alpha and palette modes to opaque color.
            let rgb = resized.to_rgb8();

            let mut bytes = Vec::new();
            let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
            rgb.write_with_encoder(encoder)
                .map_err(|e| MarkError::Input {
                    ordinal: page.ordinal,
                    reason: format!("failed to re-encode image: {}", e),
                })?;

            Ok(PagePayload {
                bytes,
                mime_type: "image/jpeg".to_string(),
            })
        }
    }
}

/// Normalize every page of a submission in order, failing fast on the first
/// unreadable page.
pub fn normalize_submission(submission: &Submission) -> Result<Vec<PagePayload>, MarkError> {
    submission.pages.iter().map(normalize_page).collect()
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, Rgba, RgbaImage};

    use super::*;

    fn png_page(width: u32, height: u32, ordinal: usize) -> Page {
        let mut img = RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = Rgba([120, 200, 80, 128]);
        }
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        Page {
            bytes,
            kind: MediaKind::Raster,
            ordinal,
        }
    }

    #[test]
    fn test_oversized_image_is_downsampled() {
        let page = png_page(2048, 1024, 0);
        let payload = normalize_page(&page).unwrap();
        assert_eq!(payload.mime_type, "image/jpeg");

        let decoded = image::load_from_memory(&payload.bytes).unwrap();
        assert_eq!(decoded.width(), 1024);
        assert_eq!(decoded.height(), 512);
    }

    #[test]
    fn test_in_bounds_image_keeps_dimensions() {
        let page = png_page(640, 480, 0);
        let payload = normalize_page(&page).unwrap();

        let decoded = image::load_from_memory(&payload.bytes).unwrap();
        assert_eq!(decoded.width(), 640);
        assert_eq!(decoded.height(), 480);
    }

    #[test]
    fn test_normalize_is_idempotent_on_dimensions() {
        let page = png_page(800, 600, 0);
        let first = normalize_page(&page).unwrap();

        let second = normalize_page(&Page {
            bytes: first.bytes.clone(),
            kind: MediaKind::Raster,
            ordinal: 0,
        })
        .unwrap();

        let a = image::load_from_memory(&first.bytes).unwrap();
        let b = image::load_from_memory(&second.bytes).unwrap();
        assert_eq!((a.width(), a.height()), (b.width(), b.height()));
    }

    #[test]
    fn test_alpha_is_flattened() {
        let page = png_page(32, 32, 0);
        let payload = normalize_page(&page).unwrap();
        // JPEG has no alpha channel; decoding must yield opaque color.
        let decoded = image::load_from_memory(&payload.bytes).unwrap();
        assert_eq!(decoded.color().channel_count(), 3);
    }

    #[test]
    fn test_document_passes_through() {
        let page = Page {
            bytes: b"%PDF-1.4 fake".to_vec(),
            kind: MediaKind::Document,
            ordinal: 1,
        };
        let payload = normalize_page(&page).unwrap();
        assert_eq!(payload.mime_type, "application/pdf");
        assert_eq!(payload.bytes, page.bytes);
    }

    #[test]
    fn test_corrupt_image_is_input_error() {
        let page = Page {
            bytes: vec![0, 1, 2, 3, 4],
            kind: MediaKind::Raster,
            ordinal: 2,
        };
        let result = normalize_page(&page);
        assert!(matches!(result, Err(MarkError::Input { ordinal: 2, .. })));
    }
}
