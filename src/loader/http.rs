//! HTTP collaborators built on the blocking reqwest client
//!
//! Each call blocks the page worker (or thumbnail thread) that issued it,
//! so the viewer itself never waits on the network.

use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;

use super::payload::{assemble_page, decode_image, encode_thumbnail, inline_image, parse_text_layer};
use super::{PageLoader, ThumbnailFetcher, ThumbnailRequest};
use crate::viewer::{FetchError, ImageRef, PageData, PageTextLayer, PageUrls, Thumbnail};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Whether a page URL should go over HTTP
#[must_use]
pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Thin wrapper around a shared client: timeouts, one retry on transport
/// errors, status codes mapped to `FetchError`
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    retries: u32,
}

impl HttpClient {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("altoview/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::collaborator(format!("building HTTP client: {e}")))?;
        Ok(Self { client, retries: 1 })
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    fn get(&self, url: &str) -> Result<Response, FetchError> {
        let mut attempt = 0;
        loop {
            debug!("GET {url} (attempt {})", attempt + 1);
            match self.client.get(url).send() {
                Ok(response) => {
                    return response
                        .error_for_status()
                        .map_err(|e| FetchError::collaborator(format!("{url}: {e}")));
                }
                Err(e) if attempt < self.retries && (e.is_connect() || e.is_timeout()) => {
                    warn!("Retrying {url}: {e}");
                    attempt += 1;
                    std::thread::sleep(Duration::from_millis(50 * 4_u64.pow(attempt - 1)));
                }
                Err(e) => return Err(FetchError::collaborator(format!("{url}: {e}"))),
            }
        }
    }

    /// Fetch the body together with its declared content type
    fn get_bytes(&self, url: &str) -> Result<(Option<String>, Vec<u8>), FetchError> {
        let response = self.get(url)?;
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .filter(|value| !value.is_empty());
        let bytes = response
            .bytes()
            .map_err(|e| FetchError::collaborator(format!("{url}: reading body: {e}")))?;
        Ok((mime, bytes.to_vec()))
    }
}

/// Loads pages whose image and text layer URLs are HTTP(S)
#[derive(Clone, Debug)]
pub struct HttpPageLoader {
    http: HttpClient,
}

impl HttpPageLoader {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self::with_client(HttpClient::new()?))
    }

    #[must_use]
    pub fn with_client(http: HttpClient) -> Self {
        Self { http }
    }

    fn fetch_image(&self, url: &str) -> Result<(ImageRef, Option<(u32, u32)>), FetchError> {
        let (mime, bytes) = self.http.get_bytes(url)?;
        let mime = mime.unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
        debug!("Image fetched: {} bytes ({mime})", bytes.len());
        Ok(inline_image(&mime, &bytes, url))
    }

    fn fetch_text_layer(&self, url: &str) -> Result<PageTextLayer, FetchError> {
        if url.is_empty() {
            return Ok(PageTextLayer::empty());
        }
        let (_, bytes) = self.http.get_bytes(url)?;
        parse_text_layer(&bytes, url)
    }
}

impl PageLoader for HttpPageLoader {
    fn load_page(&self, index: usize, urls: &PageUrls) -> Result<PageData, FetchError> {
        Ok(assemble_page(
            index,
            self.fetch_image(&urls.image),
            self.fetch_text_layer(&urls.text_layer),
        ))
    }
}

/// Downloads page images and turns them into fixed-width JPEG thumbnails
#[derive(Clone, Debug)]
pub struct HttpThumbnailFetcher {
    http: HttpClient,
    max_width: u32,
}

impl HttpThumbnailFetcher {
    pub fn new(max_width: u32) -> Result<Self, FetchError> {
        Ok(Self::with_client(HttpClient::new()?, max_width))
    }

    #[must_use]
    pub fn with_client(http: HttpClient, max_width: u32) -> Self {
        Self {
            http,
            max_width: max_width.max(1),
        }
    }

    fn thumbnail(&self, request: &ThumbnailRequest) -> Result<Thumbnail, FetchError> {
        let (_, bytes) = self.http.get_bytes(&request.image_url)?;
        let img = decode_image(&bytes, &request.image_url)?;
        Ok(Thumbnail {
            index: request.index,
            image: encode_thumbnail(img, self.max_width)?,
        })
    }
}

impl ThumbnailFetcher for HttpThumbnailFetcher {
    fn fetch_thumbnails(
        &self,
        requests: &[ThumbnailRequest],
    ) -> Result<Vec<Thumbnail>, FetchError> {
        let mut thumbnails = Vec::with_capacity(requests.len());
        for request in requests {
            match self.thumbnail(request) {
                Ok(thumbnail) => thumbnails.push(thumbnail),
                Err(e) => warn!("Failed to fetch thumbnail for page {}: {e}", request.index),
            }
        }
        Ok(thumbnails)
    }
}
