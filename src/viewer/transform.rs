//! Pan/zoom transform between image space and screen space
//!
//! `screen = image * scale + (x, y)`, in CSS pixels of the canvas element.

use super::types::{Point, Size};

/// Lowest zoom factor the view accepts
pub const MIN_SCALE: f64 = 0.1;
/// Highest zoom factor the view accepts
pub const MAX_SCALE: f64 = 10.0;
/// Margin kept around a fitted image, in CSS pixels
pub const FIT_PADDING: f64 = 8.0;

/// Allowed zoom range
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self {
            min: MIN_SCALE,
            max: MAX_SCALE,
        }
    }
}

impl ScaleLimits {
    /// Clamp to the range, handling NaN/Inf
    #[must_use]
    pub fn clamp(&self, scale: f64) -> f64 {
        if scale.is_finite() {
            scale.clamp(self.min, self.max)
        } else {
            1.0_f64.clamp(self.min, self.max)
        }
    }
}

/// Affine view transform with uniform scale
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        scale: 1.0,
    };

    #[must_use]
    pub const fn new(x: f64, y: f64, scale: f64) -> Self {
        Self { x, y, scale }
    }

    #[must_use]
    pub fn screen_to_image(&self, sx: f64, sy: f64) -> Point {
        Point::new((sx - self.x) / self.scale, (sy - self.y) / self.scale)
    }

    #[must_use]
    pub fn image_to_screen(&self, ix: f64, iy: f64) -> Point {
        Point::new(ix * self.scale + self.x, iy * self.scale + self.y)
    }

    /// Rescale around a fixed screen point, keeping that point where it is.
    pub fn zoom_around(&mut self, anchor: Point, new_scale: f64) {
        let ratio = new_scale / self.scale;
        self.x = anchor.x - (anchor.x - self.x) * ratio;
        self.y = anchor.y - (anchor.y - self.y) * ratio;
        self.scale = new_scale;
    }

    /// Pan so that the image point lands at the canvas center
    pub fn center_on(&mut self, image_x: f64, image_y: f64, canvas: Size) {
        self.x = canvas.width / 2.0 - image_x * self.scale;
        self.y = canvas.height / 2.0 - image_y * self.scale;
    }

    /// Whether the image point is on screen, at least `margin` pixels inside each edge
    #[must_use]
    pub fn is_point_visible(&self, image_x: f64, image_y: f64, canvas: Size, margin: f64) -> bool {
        let p = self.image_to_screen(image_x, image_y);
        p.x >= margin
            && p.y >= margin
            && p.x <= canvas.width - margin
            && p.y <= canvas.height - margin
    }
}

/// Fit an image into the canvas minus padding, centered.
///
/// Small images are enlarged; the result is clamped into `limits`.
#[must_use]
pub fn fit_to_canvas(image: Size, canvas: Size, padding: f64, limits: ScaleLimits) -> Transform {
    if image.width <= 0.0 || image.height <= 0.0 {
        return Transform::IDENTITY;
    }

    let avail_w = (canvas.width - 2.0 * padding).max(1.0);
    let avail_h = (canvas.height - 2.0 * padding).max(1.0);
    let scale = limits.clamp((avail_w / image.width).min(avail_h / image.height));

    Transform {
        x: (canvas.width - image.width * scale) / 2.0,
        y: (canvas.height - image.height * scale) / 2.0,
        scale,
    }
}
