//! Drawing surface seam for the canvas controller

use super::types::Size;

/// Cursor affordance shown over the canvas
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cursor {
    #[default]
    Grab,
    Grabbing,
    Pointer,
    Default,
}

impl Cursor {
    /// CSS `cursor` value
    #[must_use]
    pub fn as_css(self) -> &'static str {
        match self {
            Self::Grab => "grab",
            Self::Grabbing => "grabbing",
            Self::Pointer => "pointer",
            Self::Default => "default",
        }
    }
}

/// Fill and stroke for an overlay polygon
#[derive(Clone, Debug, PartialEq)]
pub struct PolygonStyle {
    /// CSS color for the fill, `None` for no fill
    pub fill: Option<String>,
    /// CSS color for the outline, `None` for no outline
    pub stroke: Option<String>,
    /// Outline width in screen pixels
    pub line_width: f64,
}

/// Anything drawn as a page image
pub trait ImageSource {
    /// Intrinsic pixel size of the decoded image
    fn natural_size(&self) -> Size;
}

/// Dimensions alone, for hosts that size the page before decoding it
impl ImageSource for Size {
    fn natural_size(&self) -> Size {
        *self
    }
}

/// A 2D canvas backed by a device-pixel buffer
pub trait Surface {
    type Image: ImageSource;

    /// Size of the element on screen, CSS pixels
    fn client_size(&self) -> Size;

    fn device_pixel_ratio(&self) -> f64;

    /// Size of the backing pixel buffer
    fn buffer_size(&self) -> (u32, u32);

    /// Reallocate the backing pixel buffer
    fn set_buffer_size(&mut self, width: u32, height: u32);

    /// Reset the transform and clear every pixel
    fn clear(&mut self);

    /// Set the active transform as `(a, e, f)` of a uniform scale+translate matrix
    fn set_transform(&mut self, scale: f64, translate_x: f64, translate_y: f64);

    /// Draw the image with its top-left corner at the origin of the active transform
    fn draw_image(&mut self, image: &Self::Image);

    /// Draw a closed polygon from flat points, in the active transform's space
    fn draw_polygon(&mut self, points: &[f64], style: &PolygonStyle);

    fn set_cursor(&mut self, cursor: Cursor);

    fn capture_pointer(&mut self, pointer_id: i32);

    fn release_pointer(&mut self, pointer_id: i32);
}
