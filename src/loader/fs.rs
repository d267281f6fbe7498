//! Filesystem-backed collaborators
//!
//! Page images are inlined as base64 data URLs, the way a tool transport
//! would deliver them, so hosts can treat both sources the same.

use std::path::{Path, PathBuf};

use log::warn;

use super::payload::{assemble_page, decode_image, encode_thumbnail, inline_image, parse_text_layer};
use super::{PageLoader, ThumbnailFetcher, ThumbnailRequest};
use crate::viewer::{FetchError, ImageRef, PageData, PageTextLayer, PageUrls, Thumbnail};

/// Resolve a page URL to a path: `file://` URLs, absolute paths and paths
/// relative to `base_dir` are accepted
fn resolve(base_dir: &Path, url: &str) -> Result<PathBuf, FetchError> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if url.contains("://") {
        return Err(FetchError::collaborator(format!(
            "unsupported URL scheme: {url}"
        )));
    }
    let path = Path::new(url);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(base_dir.join(path))
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("tif" | "tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Loads pages from image files and text layer JSON files
#[derive(Clone, Debug)]
pub struct FsPageLoader {
    base_dir: PathBuf,
}

impl FsPageLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn read_image(&self, url: &str) -> Result<(ImageRef, Option<(u32, u32)>), FetchError> {
        let path = resolve(&self.base_dir, url)?;
        let bytes = std::fs::read(&path)?;
        Ok(inline_image(
            mime_for(&path),
            &bytes,
            &path.display().to_string(),
        ))
    }

    fn read_text_layer(&self, url: &str) -> Result<PageTextLayer, FetchError> {
        let path = resolve(&self.base_dir, url)?;
        let bytes = std::fs::read(&path)?;
        parse_text_layer(&bytes, &path.display().to_string())
    }
}

impl PageLoader for FsPageLoader {
    fn load_page(&self, index: usize, urls: &PageUrls) -> Result<PageData, FetchError> {
        Ok(assemble_page(
            index,
            self.read_image(&urls.image),
            self.read_text_layer(&urls.text_layer),
        ))
    }
}

/// Produces JPEG thumbnails of a fixed width from image files
#[derive(Clone, Debug)]
pub struct FsThumbnailFetcher {
    base_dir: PathBuf,
    max_width: u32,
}

impl FsThumbnailFetcher {
    pub fn new(base_dir: impl Into<PathBuf>, max_width: u32) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_width: max_width.max(1),
        }
    }

    fn thumbnail(&self, request: &ThumbnailRequest) -> Result<Thumbnail, FetchError> {
        let path = resolve(&self.base_dir, &request.image_url)?;
        let bytes = std::fs::read(&path)?;
        let img = decode_image(&bytes, &path.display().to_string())?;
        Ok(Thumbnail {
            index: request.index,
            image: encode_thumbnail(img, self.max_width)?,
        })
    }
}

impl ThumbnailFetcher for FsThumbnailFetcher {
    fn fetch_thumbnails(
        &self,
        requests: &[ThumbnailRequest],
    ) -> Result<Vec<Thumbnail>, FetchError> {
        let mut thumbnails = Vec::with_capacity(requests.len());
        for request in requests {
            match self.thumbnail(request) {
                Ok(thumbnail) => thumbnails.push(thumbnail),
                Err(e) => warn!("Failed to create thumbnail for page {}: {e}", request.index),
            }
        }
        Ok(thumbnails)
    }
}
