//! Canvas controller - pan/zoom state machine and draw orchestration
//!
//! Owns the view transform and reacts to pointer and wheel input:
//!
//! - drag past a small threshold pans 1:1, release with speed coasts with
//!   friction until the speed is negligible
//! - a press without travel is a click and goes to the handler
//! - wheel input moves a zoom target; the scale converges to it over frames
//!   while the point under the cursor stays fixed on screen
//!
//! Redraws are coalesced into one draw per frame and deferred while the canvas
//! is not visible. Page-specific behavior (hover, selection, overlays) lives in
//! a [`CanvasHandler`].

use log::debug;

use super::scheduler::{FrameHandle, FrameScheduler};
use super::surface::{Cursor, ImageSource, Surface};
use super::transform::{ScaleLimits, Transform, fit_to_canvas};
use super::types::Point;
use crate::settings::{GestureConfig, ViewConfig};

/// Mouse/pen/touch button that produced a pointer event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
    Other,
}

/// Pointer event in canvas-relative CSS pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: i32,
    pub button: PointerButton,
    pub x: f64,
    pub y: f64,
    /// Event timestamp in milliseconds
    pub time_ms: f64,
}

impl PointerEvent {
    #[must_use]
    pub fn primary(x: f64, y: f64, time_ms: f64) -> Self {
        Self {
            pointer_id: 1,
            button: PointerButton::Primary,
            x,
            y,
            time_ms,
        }
    }

    fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Unit of a wheel delta
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WheelDeltaMode {
    Pixel,
    Line,
    Page,
}

/// Wheel event in canvas-relative CSS pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelEvent {
    pub x: f64,
    pub y: f64,
    pub delta_y: f64,
    pub mode: WheelDeltaMode,
}

impl WheelEvent {
    #[must_use]
    pub fn pixels(x: f64, y: f64, delta_y: f64) -> Self {
        Self {
            x,
            y,
            delta_y,
            mode: WheelDeltaMode::Pixel,
        }
    }
}

/// What the handler wants after a hover
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hover {
    /// Cursor to show; `None` falls back to the grab affordance
    pub cursor: Option<Cursor>,
    pub redraw: bool,
}

/// Page-specific behavior plugged into the controller
pub trait CanvasHandler<S: Surface> {
    /// Pointer moved without a drag in progress
    fn on_hover(&mut self, _image: Point, _screen: Point) -> Hover {
        Hover::default()
    }

    /// Press and release without travel. Returns whether a redraw is needed.
    fn on_click(&mut self, _image: Point) -> bool {
        false
    }

    /// Pointer left the canvas. Returns whether a redraw is needed.
    fn on_leave(&mut self) -> bool {
        false
    }

    /// Called after the page image is drawn, with the image-space transform still active
    fn after_draw(&mut self, _surface: &mut S, _transform: &Transform) {}
}

/// Identifies one image load so late completions can be ignored
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageTicket(u64);

#[derive(Clone, Copy, Debug)]
struct Velocity {
    x: f64,
    y: f64,
}

impl Velocity {
    fn speed(self) -> f64 {
        self.x.hypot(self.y)
    }
}

#[derive(Clone, Copy, Debug)]
struct DragState {
    pointer_id: i32,
    down: Point,
    /// Translation at pointer-down
    origin: Point,
    moved: bool,
    last: Point,
    last_time_ms: f64,
    velocity: Velocity,
}

pub struct CanvasController<S, F, H>
where
    S: Surface,
    F: FrameScheduler,
    H: CanvasHandler<S>,
{
    surface: S,
    frames: F,
    handler: H,
    view: ViewConfig,
    gesture: GestureConfig,
    limits: ScaleLimits,
    transform: Transform,
    image: Option<S::Image>,
    image_ticket: u64,
    drag: Option<DragState>,
    inertia: Option<Velocity>,
    zoom_target: f64,
    /// Screen point kept fixed while the zoom animation runs
    zoom_anchor: Option<Point>,
    frame: Option<FrameHandle>,
    draw_requested: bool,
    visible: bool,
    deferred_draw: bool,
    destroyed: bool,
}

impl<S, F, H> CanvasController<S, F, H>
where
    S: Surface,
    F: FrameScheduler,
    H: CanvasHandler<S>,
{
    /// Create a controller with default view and gesture tuning
    pub fn new(surface: S, frames: F, handler: H) -> Self {
        Self::with_config(
            surface,
            frames,
            handler,
            ViewConfig::default(),
            GestureConfig::default(),
        )
    }

    pub fn with_config(
        surface: S,
        frames: F,
        handler: H,
        view: ViewConfig,
        gesture: GestureConfig,
    ) -> Self {
        let limits = ScaleLimits {
            min: view.min_scale,
            max: view.max_scale,
        };
        let mut surface = surface;
        surface.set_cursor(Cursor::Grab);

        Self {
            surface,
            frames,
            handler,
            view,
            gesture,
            limits,
            transform: Transform::IDENTITY,
            image: None,
            image_ticket: 0,
            drag: None,
            inertia: None,
            zoom_target: 1.0,
            zoom_anchor: None,
            frame: None,
            draw_requested: false,
            visible: true,
            deferred_draw: false,
            destroyed: false,
        }
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    #[must_use]
    pub fn zoom_target(&self) -> f64 {
        self.zoom_target
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn frames_mut(&mut self) -> &mut F {
        &mut self.frames
    }

    #[must_use]
    pub fn image(&self) -> Option<&S::Image> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some_and(|d| d.moved)
    }

    #[must_use]
    pub fn is_coasting(&self) -> bool {
        self.inertia.is_some()
    }

    #[must_use]
    pub fn is_zooming(&self) -> bool {
        self.zoom_anchor.is_some()
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // --- image lifecycle ---

    /// Start loading a new image; completions for earlier tickets become no-ops
    pub fn begin_image_load(&mut self) -> ImageTicket {
        self.image_ticket += 1;
        ImageTicket(self.image_ticket)
    }

    /// Finish an image load started with [`Self::begin_image_load`].
    ///
    /// `None` means the image failed to decode: the canvas is left blank while
    /// overlays keep drawing. Returns `false` when the ticket is stale.
    pub fn finish_image_load(&mut self, ticket: ImageTicket, image: Option<S::Image>) -> bool {
        if self.destroyed || ticket.0 != self.image_ticket {
            debug!("Ignoring stale image load {ticket:?}");
            return false;
        }

        match image {
            Some(image) => {
                self.image = Some(image);
                self.fit_to_canvas();
            }
            None => {
                debug!("Image failed to load, leaving canvas blank");
                self.image = None;
            }
        }
        self.request_draw();
        true
    }

    /// Replace the image immediately
    pub fn set_image(&mut self, image: S::Image) {
        let ticket = self.begin_image_load();
        self.finish_image_load(ticket, Some(image));
    }

    // --- view operations ---

    /// Fit the image into the canvas and resync the zoom target
    pub fn fit_to_canvas(&mut self) {
        let Some(image) = &self.image else {
            return;
        };
        self.transform = fit_to_canvas(
            image.natural_size(),
            self.surface.client_size(),
            self.view.fit_padding,
            self.limits,
        );
        self.zoom_target = self.transform.scale;
        self.zoom_anchor = None;
        self.inertia = None;
    }

    pub fn reset_view(&mut self) {
        self.fit_to_canvas();
        self.request_draw();
    }

    /// Pan (without zooming) so the image point lands at the canvas center
    pub fn center_on(&mut self, image_x: f64, image_y: f64) {
        if self.destroyed {
            return;
        }
        self.inertia = None;
        self.zoom_anchor = None;
        self.transform.center_on(image_x, image_y, self.surface.client_size());
        self.zoom_target = self.transform.scale;
        self.request_draw();
    }

    #[must_use]
    pub fn is_point_visible(&self, image_x: f64, image_y: f64, margin: f64) -> bool {
        self.transform.is_point_visible(image_x, image_y, self.surface.client_size(), margin)
    }

    // --- pointer protocol ---

    pub fn pointer_down(&mut self, event: PointerEvent) {
        if self.destroyed || event.button != PointerButton::Primary {
            return;
        }

        self.inertia = None;
        self.surface.capture_pointer(event.pointer_id);
        self.surface.set_cursor(Cursor::Grabbing);
        self.drag = Some(DragState {
            pointer_id: event.pointer_id,
            down: event.position(),
            origin: Point::new(self.transform.x, self.transform.y),
            moved: false,
            last: event.position(),
            last_time_ms: event.time_ms,
            velocity: Velocity { x: 0.0, y: 0.0 },
        });
    }

    pub fn pointer_move(&mut self, event: PointerEvent) {
        if self.destroyed {
            return;
        }

        let Some(mut drag) = self.drag.filter(|d| d.pointer_id == event.pointer_id) else {
            let image = self.transform.screen_to_image(event.x, event.y);
            let hover = self.handler.on_hover(image, event.position());
            self.surface.set_cursor(hover.cursor.unwrap_or(Cursor::Grab));
            if hover.redraw {
                self.request_draw();
            }
            return;
        };

        let dx = event.x - drag.down.x;
        let dy = event.y - drag.down.y;
        if !drag.moved && dx * dx + dy * dy > self.gesture.drag_threshold_sq {
            drag.moved = true;
        }

        let dt = event.time_ms - drag.last_time_ms;
        if dt > 0.0 {
            drag.velocity = Velocity {
                x: (event.x - drag.last.x) / dt,
                y: (event.y - drag.last.y) / dt,
            };
        }
        drag.last = event.position();
        drag.last_time_ms = event.time_ms;

        if drag.moved {
            self.transform.x = drag.origin.x + dx;
            self.transform.y = drag.origin.y + dy;
            self.request_draw();
        }
        self.drag = Some(drag);
    }

    pub fn pointer_up(&mut self, event: PointerEvent) {
        if self.destroyed {
            return;
        }
        let Some(drag) = self.drag.filter(|d| d.pointer_id == event.pointer_id) else {
            return;
        };
        self.drag = None;
        self.surface.release_pointer(drag.pointer_id);
        self.surface.set_cursor(Cursor::Grab);

        if drag.moved {
            if drag.velocity.speed() > self.gesture.min_inertia_speed {
                self.inertia = Some(drag.velocity);
                self.schedule_frame();
            }
            return;
        }

        let image = self.transform.screen_to_image(event.x, event.y);
        if self.handler.on_click(image) {
            self.request_draw();
        }
    }

    /// The platform aborted the gesture; ends a drag without click or inertia
    pub fn pointer_cancel(&mut self, pointer_id: i32) {
        if let Some(drag) = self.drag.filter(|d| d.pointer_id == pointer_id) {
            self.drag = None;
            self.surface.release_pointer(drag.pointer_id);
            self.surface.set_cursor(Cursor::Grab);
        }
    }

    pub fn pointer_leave(&mut self) {
        if self.destroyed {
            return;
        }
        if self.handler.on_leave() {
            self.request_draw();
        }
    }

    // --- wheel protocol ---

    pub fn wheel(&mut self, event: WheelEvent) {
        if self.destroyed {
            return;
        }

        let delta = match event.mode {
            WheelDeltaMode::Pixel => event.delta_y,
            WheelDeltaMode::Line => event.delta_y * self.view.wheel_line_px,
            WheelDeltaMode::Page => event.delta_y * self.surface.client_size().height,
        };
        let factor = (delta * self.view.zoom_speed).exp();
        self.zoom_target = self.limits.clamp(self.zoom_target * factor);

        let was_zooming = self.zoom_anchor.is_some();
        self.zoom_anchor = Some(Point::new(event.x, event.y));
        if !was_zooming {
            self.schedule_frame();
        }
    }

    // --- frame loop ---

    /// Ask for a draw on the next frame; repeated calls within a frame coalesce
    pub fn request_draw(&mut self) {
        if self.destroyed {
            return;
        }
        if !self.visible {
            self.deferred_draw = true;
            return;
        }
        self.draw_requested = true;
        self.schedule_frame();
    }

    /// Host callback for a frame previously requested from the scheduler
    pub fn on_frame(&mut self, handle: FrameHandle) {
        if self.destroyed || self.frame != Some(handle) {
            return;
        }
        self.frame = None;

        let coasted = self.step_inertia();
        let zoomed = self.step_zoom();
        if coasted || zoomed {
            self.draw_requested = true;
        }

        if self.draw_requested {
            self.draw_requested = false;
            if self.visible {
                self.draw();
            } else {
                self.deferred_draw = true;
            }
        }

        if self.inertia.is_some() || self.zoom_anchor.is_some() {
            self.schedule_frame();
        }
    }

    /// Visibility of the host element changed
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if visible && self.deferred_draw {
            self.deferred_draw = false;
            self.request_draw();
        }
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The host element changed size
    pub fn on_resize(&mut self) {
        self.request_draw();
    }

    /// Stop every animation and pending frame; nothing fires afterwards
    pub fn destroy(&mut self) {
        if let Some(handle) = self.frame.take() {
            self.frames.cancel_frame(handle);
        }
        if let Some(drag) = self.drag.take() {
            self.surface.release_pointer(drag.pointer_id);
        }
        self.inertia = None;
        self.zoom_anchor = None;
        self.draw_requested = false;
        self.deferred_draw = false;
        self.image = None;
        self.destroyed = true;
    }

    fn schedule_frame(&mut self) {
        if self.frame.is_none() {
            self.frame = Some(self.frames.request_frame());
        }
    }

    fn step_inertia(&mut self) -> bool {
        let Some(mut velocity) = self.inertia else {
            return false;
        };
        if velocity.speed() < self.gesture.stop_speed {
            self.inertia = None;
            return false;
        }

        let dt = self.gesture.frame_interval_ms;
        self.transform.x += velocity.x * dt;
        self.transform.y += velocity.y * dt;
        velocity.x *= self.gesture.friction;
        velocity.y *= self.gesture.friction;

        self.inertia = (velocity.speed() >= self.gesture.stop_speed).then_some(velocity);
        true
    }

    fn step_zoom(&mut self) -> bool {
        let Some(anchor) = self.zoom_anchor else {
            return false;
        };

        let target = self.zoom_target;
        let current = self.transform.scale;
        let mut next = current + (target - current) * self.view.zoom_lerp;
        if (target - next).abs() < self.view.zoom_epsilon {
            next = target;
            self.zoom_anchor = None;
        }

        let (x, y) = (self.transform.x, self.transform.y);
        self.transform.zoom_around(anchor, next);
        // An active drag keeps panning from wherever the zoom left the image
        if let Some(drag) = &mut self.drag {
            drag.origin.x += self.transform.x - x;
            drag.origin.y += self.transform.y - y;
        }
        true
    }

    fn draw(&mut self) {
        let client = self.surface.client_size();
        let dpr = self.surface.device_pixel_ratio();
        let buffer = (
            (client.width * dpr).round().max(0.0) as u32,
            (client.height * dpr).round().max(0.0) as u32,
        );
        if self.surface.buffer_size() != buffer {
            self.surface.set_buffer_size(buffer.0, buffer.1);
        }

        self.surface.clear();
        let t = self.transform;
        self.surface.set_transform(t.scale * dpr, t.x * dpr, t.y * dpr);
        if let Some(image) = &self.image {
            self.surface.draw_image(image);
        }
        self.handler.after_draw(&mut self.surface, &t);
    }
}
