//! Core data types for the page viewer
//!
//! Everything here is immutable once loaded: pages are shared between the
//! cache, the session and the overlay as `Arc<PageData>`.

use serde::{Deserialize, Serialize};

use super::request::FetchError;

/// One recognized line of text on a page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLine {
    /// Identifier, unique within a page
    pub id: String,
    /// Boundary as whitespace separated "x,y" pairs, ring implicitly closed
    pub polygon: String,
    pub transcription: String,
    #[serde(default)]
    pub hpos: i32,
    #[serde(default)]
    pub vpos: i32,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    /// Recognition confidence in 0.0..=1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl TextLine {
    pub fn new(id: impl Into<String>, polygon: impl Into<String>, text: impl Into<String>) -> Self {
        let polygon = polygon.into();
        let (hpos, vpos, width, height) = Self::bbox_from_polygon(&polygon);
        Self {
            id: id.into(),
            polygon,
            transcription: text.into(),
            hpos,
            vpos,
            width,
            height,
            confidence: None,
        }
    }

    /// Compute `(hpos, vpos, width, height)` from integer polygon points.
    ///
    /// Returns all zeros when any pair fails to parse or the polygon is empty.
    #[must_use]
    pub fn bbox_from_polygon(polygon: &str) -> (i32, i32, i32, i32) {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for pair in polygon.split_whitespace() {
            let Some((x, y)) = pair.split_once(',') else {
                return (0, 0, 0, 0);
            };
            match (x.trim().parse::<i32>(), y.trim().parse::<i32>()) {
                (Ok(x), Ok(y)) => {
                    xs.push(x);
                    ys.push(y);
                }
                _ => return (0, 0, 0, 0),
            }
        }

        match (
            xs.iter().min(),
            xs.iter().max(),
            ys.iter().min(),
            ys.iter().max(),
        ) {
            (Some(&x0), Some(&x1), Some(&y0), Some(&y1)) => (x0, y0, x1 - x0, y1 - y0),
            _ => (0, 0, 0, 0),
        }
    }
}

/// Per-page collection of text lines in reading order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTextLayer {
    pub text_lines: Vec<TextLine>,
    /// Nominal page size declared by the text layer (0 when unknown)
    #[serde(default)]
    pub page_width: u32,
    #[serde(default)]
    pub page_height: u32,
}

impl PageTextLayer {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// All transcriptions joined by newlines, in reading order
    #[must_use]
    pub fn full_text(&self) -> String {
        self.text_lines
            .iter()
            .map(|line| line.transcription.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[must_use]
    pub fn line(&self, id: &str) -> Option<&TextLine> {
        self.text_lines.iter().find(|line| line.id == id)
    }
}

/// Reference to a page image: either a remote URL or inline data
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImageRef {
    Url { url: String },
    DataUrl { mime: String, data: String },
}

impl ImageRef {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    /// Build an inline image from already base64 encoded bytes
    pub fn data_url(mime: impl Into<String>, base64: impl Into<String>) -> Self {
        Self::DataUrl {
            mime: mime.into(),
            data: base64.into(),
        }
    }

    /// The value a browser `<img src>` would take
    #[must_use]
    pub fn to_src(&self) -> String {
        match self {
            Self::Url { url } => url.clone(),
            Self::DataUrl { mime, data } => format!("data:{mime};base64,{data}"),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Url { url } => url.is_empty(),
            Self::DataUrl { data, .. } => data.is_empty(),
        }
    }
}

impl std::fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url { url } => f.debug_tuple("Url").field(url).finish(),
            Self::DataUrl { mime, data } => f
                .debug_struct("DataUrl")
                .field("mime", mime)
                .field("bytes_b64", &data.len())
                .finish(),
        }
    }
}

/// One fully loaded, renderable page
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    /// Page index (0-indexed), matches the position in the page list
    pub index: usize,
    pub image: ImageRef,
    /// Natural pixel size of the image, when the loader knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<(u32, u32)>,
    pub text_layer: PageTextLayer,
}

impl PageData {
    /// Parse a page payload delivered as JSON by a transport.
    ///
    /// Any missing or mistyped field is reported as [`FetchError::Malformed`].
    pub fn from_json(value: serde_json::Value) -> Result<Self, FetchError> {
        serde_json::from_value(value).map_err(|e| FetchError::Malformed {
            detail: e.to_string(),
        })
    }
}

impl std::fmt::Debug for PageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageData")
            .field("index", &self.index)
            .field("image", &self.image)
            .field("image_size", &self.image_size)
            .field("text_lines_count", &self.text_layer.text_lines.len())
            .finish_non_exhaustive()
    }
}

/// Image and text layer locations for a single page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageUrls {
    pub image: String,
    #[serde(default)]
    pub text_layer: String,
}

/// Errors building a [`ViewerData`] from raw tool arguments
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ViewerDataError {
    #[error("no pages given")]
    Empty,

    #[error("mismatched URL counts ({images} images vs {text_layers} text layers)")]
    Mismatched { images: usize, text_layers: usize },
}

/// Top-level payload for one document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerData {
    pub pages: Vec<PageUrls>,
    /// Optional per-page metadata label, parallel to `pages`
    #[serde(default)]
    pub labels: Vec<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_color: Option<String>,
}

impl ViewerData {
    /// Pair `image_urls[i]` with `text_layer_urls[i]`
    pub fn from_url_lists(
        image_urls: Vec<String>,
        text_layer_urls: Vec<String>,
    ) -> Result<Self, ViewerDataError> {
        if image_urls.len() != text_layer_urls.len() {
            return Err(ViewerDataError::Mismatched {
                images: image_urls.len(),
                text_layers: text_layer_urls.len(),
            });
        }
        if image_urls.is_empty() {
            return Err(ViewerDataError::Empty);
        }

        let pages = image_urls
            .into_iter()
            .zip(text_layer_urls)
            .map(|(image, text_layer)| PageUrls { image, text_layer })
            .collect();

        Ok(Self {
            pages,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn label(&self, page: usize) -> Option<&str> {
        self.labels.get(page).and_then(|label| label.as_deref())
    }
}

/// A loaded thumbnail image for one page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thumbnail {
    pub index: usize,
    pub image: ImageRef,
}

/// Extent in CSS pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A 2D point, in either screen or image space depending on context
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
