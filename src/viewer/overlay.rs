//! Text line overlay for the active page
//!
//! Implements [`CanvasHandler`]: hovering a line shows a pointer, clicking
//! selects it, and every draw paints search matches, the hovered line and the
//! selected line over the page image.

use std::collections::HashSet;
use std::sync::Arc;

use super::controller::{CanvasController, CanvasHandler, Hover, ImageTicket};
use super::geometry::{
    LayerScale, PolygonHit, build_scaled_polygon_hits, find_hit_at_image_coord, point_in_polygon,
};
use super::scheduler::FrameScheduler;
use super::surface::{Cursor, ImageSource, PolygonStyle, Surface};
use super::transform::Transform;
use super::types::{PageData, Point, TextLine};

pub const DEFAULT_HIGHLIGHT_COLOR: &str = "rgba(255, 213, 0, 0.35)";

/// Selection changes the host should react to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverlayEvent {
    LineSelected { page: usize, line_id: String },
    SelectionCleared { page: usize },
}

#[derive(Clone, Debug)]
pub struct OverlayStyles {
    pub hover: PolygonStyle,
    pub selected: PolygonStyle,
    pub search: PolygonStyle,
}

impl Default for OverlayStyles {
    fn default() -> Self {
        Self {
            hover: PolygonStyle {
                fill: Some("rgba(59, 130, 246, 0.15)".to_string()),
                stroke: Some("rgba(59, 130, 246, 0.8)".to_string()),
                line_width: 1.0,
            },
            selected: PolygonStyle {
                fill: Some("rgba(59, 130, 246, 0.3)".to_string()),
                stroke: Some("rgb(37, 99, 235)".to_string()),
                line_width: 2.0,
            },
            search: PolygonStyle {
                fill: Some(DEFAULT_HIGHLIGHT_COLOR.to_string()),
                stroke: None,
                line_width: 0.0,
            },
        }
    }
}

#[derive(Default)]
pub struct PageOverlay {
    page: Option<Arc<PageData>>,
    hits: Vec<PolygonHit>,
    scale: LayerScale,
    /// Index into `hits`
    hovered: Option<usize>,
    selected: Option<String>,
    highlighted: HashSet<String>,
    styles: OverlayStyles,
    events: Vec<OverlayEvent>,
}

impl PageOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_styles(styles: OverlayStyles) -> Self {
        Self {
            styles,
            ..Self::default()
        }
    }

    /// Show a new page; hover, selection and highlights are reset
    pub fn set_page(&mut self, page: Arc<PageData>) {
        self.scale = LayerScale::between(
            (page.text_layer.page_width, page.text_layer.page_height),
            page.image_size,
        );
        self.hits = build_scaled_polygon_hits(&page.text_layer.text_lines, self.scale);
        self.page = Some(page);
        self.hovered = None;
        self.selected = None;
        self.highlighted.clear();
    }

    /// Rescale the polygons once the image's real pixel size is known
    pub fn set_image_size(&mut self, width: u32, height: u32) {
        let Some(page) = &self.page else {
            return;
        };
        let scale = LayerScale::between(
            (page.text_layer.page_width, page.text_layer.page_height),
            Some((width, height)),
        );
        if scale != self.scale {
            self.scale = scale;
            self.hits = build_scaled_polygon_hits(&page.text_layer.text_lines, scale);
            self.hovered = None;
        }
    }

    pub fn clear(&mut self) {
        self.page = None;
        self.hits.clear();
        self.hovered = None;
        self.selected = None;
        self.highlighted.clear();
    }

    #[must_use]
    pub fn page(&self) -> Option<&Arc<PageData>> {
        self.page.as_ref()
    }

    #[must_use]
    pub fn hits(&self) -> &[PolygonHit] {
        &self.hits
    }

    #[must_use]
    pub fn hit_at(&self, image: Point) -> Option<&PolygonHit> {
        find_hit_at_image_coord(image.x, image.y, &self.hits)
    }

    #[must_use]
    pub fn hovered_line(&self) -> Option<&TextLine> {
        let hit = self.hits.get(self.hovered?)?;
        self.line(hit.line_index)
    }

    #[must_use]
    pub fn selected_line(&self) -> Option<&TextLine> {
        let id = self.selected.as_deref()?;
        self.page.as_ref()?.text_layer.line(id)
    }

    /// Select a line programmatically; returns false for unknown ids
    pub fn select_line(&mut self, line_id: &str) -> bool {
        if !self.hits.iter().any(|hit| hit.line_id == line_id) {
            return false;
        }
        self.selected = Some(line_id.to_string());
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Highlight search matches with an optional CSS color
    pub fn set_search_highlights(
        &mut self,
        line_ids: impl IntoIterator<Item = String>,
        color: Option<&str>,
    ) {
        self.highlighted = line_ids.into_iter().collect();
        if let Some(color) = color {
            self.styles.search.fill = Some(color.to_string());
        }
    }

    #[must_use]
    pub fn is_highlighted(&self, line_id: &str) -> bool {
        self.highlighted.contains(line_id)
    }

    /// Center of a line's polygon bounds, in image space
    #[must_use]
    pub fn line_center(&self, line_id: &str) -> Option<Point> {
        let hit = self.hits.iter().find(|hit| hit.line_id == line_id)?;
        let (mut x0, mut y0) = (f64::INFINITY, f64::INFINITY);
        let (mut x1, mut y1) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for pair in hit.points.chunks_exact(2) {
            x0 = x0.min(pair[0]);
            x1 = x1.max(pair[0]);
            y0 = y0.min(pair[1]);
            y1 = y1.max(pair[1]);
        }
        Some(Point::new((x0 + x1) / 2.0, (y0 + y1) / 2.0))
    }

    /// Drain selection events raised by clicks
    pub fn take_events(&mut self) -> Vec<OverlayEvent> {
        std::mem::take(&mut self.events)
    }

    fn line(&self, line_index: usize) -> Option<&TextLine> {
        self.page.as_ref()?.text_layer.text_lines.get(line_index)
    }

    fn page_index(&self) -> usize {
        self.page.as_ref().map_or(0, |page| page.index)
    }
}

impl<S: Surface> CanvasHandler<S> for PageOverlay {
    fn on_hover(&mut self, image: Point, _screen: Point) -> Hover {
        let hovered = self
            .hits
            .iter()
            .position(|hit| point_in_polygon(image.x, image.y, &hit.points));
        let redraw = hovered != self.hovered;
        self.hovered = hovered;
        Hover {
            cursor: hovered.map(|_| Cursor::Pointer),
            redraw,
        }
    }

    fn on_click(&mut self, image: Point) -> bool {
        let page = self.page_index();
        let clicked = self.hit_at(image).map(|hit| hit.line_id.clone());
        match clicked {
            Some(id) if self.selected.as_deref() == Some(id.as_str()) => {
                self.selected = None;
                self.events.push(OverlayEvent::SelectionCleared { page });
            }
            Some(id) => {
                self.selected = Some(id.clone());
                self.events.push(OverlayEvent::LineSelected { page, line_id: id });
            }
            None if self.selected.is_some() => {
                self.selected = None;
                self.events.push(OverlayEvent::SelectionCleared { page });
            }
            None => return false,
        }
        true
    }

    fn on_leave(&mut self) -> bool {
        self.hovered.take().is_some()
    }

    fn after_draw(&mut self, surface: &mut S, transform: &Transform) {
        // Line widths are given in screen pixels; the active transform scales them
        let to_image = |style: &PolygonStyle| PolygonStyle {
            line_width: style.line_width / transform.scale,
            ..style.clone()
        };
        let search = to_image(&self.styles.search);
        let hover = to_image(&self.styles.hover);
        let selected = to_image(&self.styles.selected);

        for (i, hit) in self.hits.iter().enumerate() {
            let style = if self.selected.as_deref() == Some(hit.line_id.as_str()) {
                &selected
            } else if self.hovered == Some(i) {
                &hover
            } else if self.highlighted.contains(&hit.line_id) {
                &search
            } else {
                continue;
            };
            surface.draw_polygon(&hit.points, style);
        }
    }
}

/// Page display on top of the generic pan/zoom controller
impl<S, F> CanvasController<S, F, PageOverlay>
where
    S: Surface,
    F: FrameScheduler,
{
    /// Show a page's text layer and start loading its image.
    ///
    /// The overlay switches immediately; the image follows when the returned
    /// ticket is passed to [`Self::finish_page_image`].
    pub fn show_page(
        &mut self,
        page: Arc<PageData>,
        highlights: Vec<String>,
        highlight_color: Option<&str>,
    ) -> ImageTicket {
        let overlay = self.handler_mut();
        overlay.set_page(page);
        overlay.set_search_highlights(highlights, highlight_color);
        self.request_draw();
        self.begin_image_load()
    }

    /// Finish a page image load and realign the polygons to its pixel size
    pub fn finish_page_image(&mut self, ticket: ImageTicket, image: Option<S::Image>) -> bool {
        let natural = image.as_ref().map(ImageSource::natural_size);
        if !self.finish_image_load(ticket, image) {
            return false;
        }
        if let Some(size) = natural {
            self.handler_mut()
                .set_image_size(size.width.round() as u32, size.height.round() as u32);
            self.request_draw();
        }
        true
    }

    /// Pan a line into view if its center is outside the canvas
    pub fn reveal_line(&mut self, line_id: &str, margin: f64) -> bool {
        let Some(center) = self.handler().line_center(line_id) else {
            return false;
        };
        if !self.is_point_visible(center.x, center.y, margin) {
            self.center_on(center.x, center.y);
        }
        true
    }
}
