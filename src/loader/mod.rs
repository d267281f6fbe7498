//! Collaborators that fetch page payloads and thumbnails
//!
//! The viewer never performs I/O itself. A transport (tool calls, HTTP,
//! the filesystem) implements these traits and the viewer calls them from
//! its worker threads.

#[cfg(feature = "fs")]
pub mod fs;
#[cfg(feature = "http")]
pub mod http;
#[cfg(any(feature = "fs", feature = "http"))]
mod payload;

use crate::viewer::{FetchError, PageData, PageUrls, Thumbnail};

/// Loads one page: image reference plus parsed text layer
pub trait PageLoader: Send + Sync {
    fn load_page(&self, index: usize, urls: &PageUrls) -> Result<PageData, FetchError>;
}

/// One thumbnail wanted by the strip
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub index: usize,
    pub image_url: String,
}

/// Loads thumbnails in batches.
///
/// Returning fewer thumbnails than requested is fine; missing indices are
/// retried when they scroll back into view.
pub trait ThumbnailFetcher: Send + Sync {
    fn fetch_thumbnails(
        &self,
        requests: &[ThumbnailRequest],
    ) -> Result<Vec<Thumbnail>, FetchError>;
}

impl<T: PageLoader + ?Sized> PageLoader for std::sync::Arc<T> {
    fn load_page(&self, index: usize, urls: &PageUrls) -> Result<PageData, FetchError> {
        (**self).load_page(index, urls)
    }
}

impl<T: ThumbnailFetcher + ?Sized> ThumbnailFetcher for std::sync::Arc<T> {
    fn fetch_thumbnails(
        &self,
        requests: &[ThumbnailRequest],
    ) -> Result<Vec<Thumbnail>, FetchError> {
        (**self).fetch_thumbnails(requests)
    }
}
