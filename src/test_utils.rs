//! Doubles for the viewer's seams: a recording surface, scripted
//! collaborators and fixture builders

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::context::{ContextError, ContextReporter};
use crate::loader::{PageLoader, ThumbnailFetcher, ThumbnailRequest};
use crate::viewer::{
    Cursor, FetchError, ImageRef, ImageSource, PageData, PageTextLayer, PageUrls, PolygonStyle,
    Size, Surface, TextLine, Thumbnail, ViewerData,
};

/// Decoded image stand-in
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TestImage {
    pub width: f64,
    pub height: f64,
}

impl TestImage {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl ImageSource for TestImage {
    fn natural_size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    SetBufferSize(u32, u32),
    Clear,
    SetTransform { scale: f64, tx: f64, ty: f64 },
    DrawImage(TestImage),
    DrawPolygon { points: Vec<f64>, style: PolygonStyle },
}

/// Surface that records every call
#[derive(Debug)]
pub struct RecordingSurface {
    pub client: Size,
    pub dpr: f64,
    buffer: (u32, u32),
    ops: Vec<DrawOp>,
    cursor: Cursor,
    cursor_history: Vec<Cursor>,
    captured: HashSet<i32>,
}

impl RecordingSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            client: Size::new(width, height),
            dpr: 1.0,
            buffer: (0, 0),
            ops: vec![],
            cursor: Cursor::Default,
            cursor_history: vec![],
            captured: HashSet::new(),
        }
    }

    pub fn with_dpr(mut self, dpr: f64) -> Self {
        self.dpr = dpr;
        self
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of completed draws; every draw starts with a clear
    pub fn draw_count(&self) -> usize {
        self.ops.iter().filter(|op| **op == DrawOp::Clear).count()
    }

    pub fn polygons_drawn(&self) -> Vec<&PolygonStyle> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::DrawPolygon { style, .. } => Some(style),
                _ => None,
            })
            .collect()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn cursor_history(&self) -> &[Cursor] {
        &self.cursor_history
    }

    pub fn is_captured(&self, pointer_id: i32) -> bool {
        self.captured.contains(&pointer_id)
    }
}

impl Surface for RecordingSurface {
    type Image = TestImage;

    fn client_size(&self) -> Size {
        self.client
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.dpr
    }

    fn buffer_size(&self) -> (u32, u32) {
        self.buffer
    }

    fn set_buffer_size(&mut self, width: u32, height: u32) {
        self.buffer = (width, height);
        self.ops.push(DrawOp::SetBufferSize(width, height));
    }

    fn clear(&mut self) {
        self.ops.push(DrawOp::Clear);
    }

    fn set_transform(&mut self, scale: f64, translate_x: f64, translate_y: f64) {
        self.ops.push(DrawOp::SetTransform {
            scale,
            tx: translate_x,
            ty: translate_y,
        });
    }

    fn draw_image(&mut self, image: &TestImage) {
        self.ops.push(DrawOp::DrawImage(*image));
    }

    fn draw_polygon(&mut self, points: &[f64], style: &PolygonStyle) {
        self.ops.push(DrawOp::DrawPolygon {
            points: points.to_vec(),
            style: style.clone(),
        });
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
        self.cursor_history.push(cursor);
    }

    fn capture_pointer(&mut self, pointer_id: i32) {
        self.captured.insert(pointer_id);
    }

    fn release_pointer(&mut self, pointer_id: i32) {
        self.captured.remove(&pointer_id);
    }
}

/// `ViewerData` for `pages` pages named `page-{i}.jpg` / `page-{i}.json`
pub fn viewer_data(pages: usize) -> ViewerData {
    ViewerData {
        pages: (0..pages)
            .map(|i| PageUrls {
                image: format!("page-{i}.jpg"),
                text_layer: format!("page-{i}.json"),
            })
            .collect(),
        labels: vec![None; pages],
        search_term: None,
        highlight_color: None,
    }
}

/// Page with two stacked 100x20 lines: `l0` "Page N first line" and
/// `l1` "Page N second line" (N is 1-based)
pub fn sample_page(index: usize) -> PageData {
    let n = index + 1;
    PageData {
        index,
        image: ImageRef::url(format!("page-{index}.jpg")),
        image_size: Some((100, 100)),
        text_layer: PageTextLayer {
            text_lines: vec![
                TextLine::new("l0", "0,0 100,0 100,20 0,20", format!("Page {n} first line")),
                TextLine::new("l1", "0,40 100,40 100,60 0,60", format!("Page {n} second line")),
            ],
            page_width: 100,
            page_height: 100,
        },
    }
}

/// Page loader that serves [`sample_page`]s and counts calls per index
#[derive(Default)]
pub struct CountingLoader {
    calls: Mutex<HashMap<usize, usize>>,
    failing: Mutex<HashSet<usize>>,
    total: AtomicUsize,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loads of `index` fail until [`Self::recover_page`]
    pub fn fail_page(&self, index: usize) {
        self.failing.lock().unwrap().insert(index);
    }

    pub fn recover_page(&self, index: usize) {
        self.failing.lock().unwrap().remove(&index);
    }

    pub fn calls(&self, index: usize) -> usize {
        self.calls.lock().unwrap().get(&index).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Distinct pages requested, sorted
    pub fn requested_pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self.calls.lock().unwrap().keys().copied().collect();
        pages.sort_unstable();
        pages
    }
}

impl PageLoader for CountingLoader {
    fn load_page(&self, index: usize, _urls: &PageUrls) -> Result<PageData, FetchError> {
        *self.calls.lock().unwrap().entry(index).or_default() += 1;
        self.total.fetch_add(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(&index) {
            return Err(FetchError::collaborator(format!("page {index} unavailable")));
        }
        Ok(sample_page(index))
    }
}

/// Thumbnail fetcher recording each batch; indices can be made to go missing
#[derive(Default)]
pub struct ScriptedThumbnails {
    batches: Mutex<Vec<Vec<usize>>>,
    missing: Mutex<HashSet<usize>>,
    fail_all: AtomicBool,
}

impl ScriptedThumbnails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave `index` out of results until [`Self::restore`]
    pub fn omit(&self, index: usize) {
        self.missing.lock().unwrap().insert(index);
    }

    pub fn restore(&self, index: usize) {
        self.missing.lock().unwrap().remove(&index);
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<usize>> {
        self.batches.lock().unwrap().clone()
    }
}

impl ThumbnailFetcher for ScriptedThumbnails {
    fn fetch_thumbnails(
        &self,
        requests: &[ThumbnailRequest],
    ) -> Result<Vec<Thumbnail>, FetchError> {
        self.batches
            .lock()
            .unwrap()
            .push(requests.iter().map(|r| r.index).collect());

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(FetchError::collaborator("thumbnail service down"));
        }

        let missing = self.missing.lock().unwrap();
        Ok(requests
            .iter()
            .filter(|r| !missing.contains(&r.index))
            .map(|r| Thumbnail {
                index: r.index,
                image: ImageRef::url(format!("thumb-{}", r.image_url)),
            })
            .collect())
    }
}

/// Context reporter that keeps everything it is sent
#[derive(Default)]
pub struct RecordingReporter {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Report texts in order
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl ContextReporter for RecordingReporter {
    fn send(&self, session_id: &str, text: &str) -> Result<(), ContextError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ContextError::Unavailable("host went away".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((session_id.to_string(), text.to_string()));
        Ok(())
    }
}
