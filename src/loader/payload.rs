//! Payload decoding shared by the filesystem and HTTP collaborators

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use log::{debug, warn};

use crate::viewer::{FetchError, ImageRef, PageData, PageTextLayer, TextLine};

const THUMBNAIL_JPEG_QUALITY: u8 = 75;

/// Lines without explicit bounds get them from their polygon
pub(crate) fn fill_missing_bounds(layer: &mut PageTextLayer) {
    for line in &mut layer.text_lines {
        if line.width == 0 && line.height == 0 {
            let (hpos, vpos, width, height) = TextLine::bbox_from_polygon(&line.polygon);
            line.hpos = hpos;
            line.vpos = vpos;
            line.width = width;
            line.height = height;
        }
    }
}

pub(crate) fn parse_text_layer(bytes: &[u8], source: &str) -> Result<PageTextLayer, FetchError> {
    let mut layer: PageTextLayer = serde_json::from_slice(bytes)
        .map_err(|e| FetchError::malformed(format!("{source}: {e}")))?;
    fill_missing_bounds(&mut layer);
    Ok(layer)
}

/// Inline image bytes, sniffing the natural size from the header
pub(crate) fn inline_image(
    mime: &str,
    bytes: &[u8],
    source: &str,
) -> (ImageRef, Option<(u32, u32)>) {
    let size = match imagesize::blob_size(bytes) {
        Ok(size) => Some((size.width as u32, size.height as u32)),
        Err(e) => {
            warn!("Failed to get image size for {source}: {e}");
            None
        }
    };
    (ImageRef::data_url(mime, BASE64.encode(bytes)), size)
}

/// Assemble a page from the outcome of its two fetches.
///
/// A missing image leaves an empty data URL and a missing text layer leaves an
/// empty layer; the page is returned either way.
pub(crate) fn assemble_page(
    index: usize,
    image: Result<(ImageRef, Option<(u32, u32)>), FetchError>,
    text_layer: Result<PageTextLayer, FetchError>,
) -> PageData {
    let (image, image_size) = image.unwrap_or_else(|e| {
        warn!("Failed to load image for page {index}: {e}");
        (ImageRef::data_url("image/jpeg", ""), None)
    });
    let text_layer = text_layer.unwrap_or_else(|e| {
        warn!("Failed to load text layer for page {index}: {e}");
        PageTextLayer::empty()
    });
    debug!(
        "Loaded page {index}: {} lines, image {image_size:?}",
        text_layer.text_lines.len()
    );
    PageData {
        index,
        image,
        image_size,
        text_layer,
    }
}

/// Scale to `max_width`, keeping the aspect ratio
pub(crate) fn resize_to_width(img: DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width == 0 || width == max_width {
        return img;
    }
    let ratio = f64::from(max_width) / f64::from(width);
    let new_height = ((f64::from(height) * ratio) as u32).max(1);
    img.resize_exact(max_width, new_height, FilterType::Lanczos3)
}

/// Decode, resize and re-encode an image as a JPEG thumbnail
pub(crate) fn encode_thumbnail(img: DynamicImage, max_width: u32) -> Result<ImageRef, FetchError> {
    let img = resize_to_width(img, max_width);
    let mut jpeg = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(JpegEncoder::new_with_quality(
            &mut jpeg,
            THUMBNAIL_JPEG_QUALITY,
        ))
        .map_err(|e| FetchError::Decode {
            detail: format!("encoding thumbnail: {e}"),
        })?;
    Ok(ImageRef::data_url("image/jpeg", BASE64.encode(jpeg.into_inner())))
}

pub(crate) fn decode_image(bytes: &[u8], source: &str) -> Result<DynamicImage, FetchError> {
    image::load_from_memory(bytes).map_err(|e| FetchError::Decode {
        detail: format!("{source}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnails_always_take_the_target_width() {
        let wide = resize_to_width(DynamicImage::new_rgb8(600, 300), 150);
        assert_eq!(wide.dimensions(), (150, 75));

        let small = resize_to_width(DynamicImage::new_rgb8(100, 50), 150);
        assert_eq!(small.dimensions(), (150, 75));
    }

    #[test]
    fn missing_image_keeps_text_layer() {
        let layer = parse_text_layer(
            br#"{"textLines":[{"id":"a","polygon":"0,0 4,0 4,4","transcription":"x"}],"pageWidth":4,"pageHeight":4}"#,
            "p.json",
        );
        let page = assemble_page(2, Err(FetchError::collaborator("404")), layer);

        assert_eq!(page.index, 2);
        assert!(page.image.is_empty());
        assert_eq!(page.image_size, None);
        assert_eq!(page.text_layer.text_lines.len(), 1);
    }

    #[test]
    fn broken_text_layer_json_is_malformed() {
        let err = parse_text_layer(b"{not json", "p.json").unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
    }
}
