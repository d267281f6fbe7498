use std::sync::Arc;

use altoview::test_utils::{DrawOp, RecordingSurface, TestImage, sample_page};
use altoview::viewer::{
    CanvasController, CanvasHandler, Cursor, ManualFrames, MAX_SCALE, MIN_SCALE, OverlayEvent,
    PageOverlay, Point, PointerEvent, Transform, WheelDeltaMode, WheelEvent,
};

#[derive(Default)]
struct ClickRecorder {
    clicks: Vec<Point>,
    after_draws: usize,
}

impl CanvasHandler<RecordingSurface> for ClickRecorder {
    fn on_click(&mut self, image: Point) -> bool {
        self.clicks.push(image);
        false
    }

    fn after_draw(&mut self, _surface: &mut RecordingSurface, _transform: &Transform) {
        self.after_draws += 1;
    }
}

type TestController<H> = CanvasController<RecordingSurface, ManualFrames, H>;

/// 1000x1000 image fitted into an 800x600 canvas: scale 0.584 at (108, 8)
fn fitted_controller() -> TestController<ClickRecorder> {
    let mut ctrl = CanvasController::new(
        RecordingSurface::new(800.0, 600.0),
        ManualFrames::new(),
        ClickRecorder::default(),
    );
    ctrl.set_image(TestImage::new(1000.0, 1000.0));
    run_frames(&mut ctrl);
    ctrl.surface_mut().take_ops();
    ctrl
}

fn run_frames<H: CanvasHandler<RecordingSurface>>(ctrl: &mut TestController<H>) -> usize {
    let mut fired = 0;
    while let Some(handle) = ctrl.frames_mut().take_next() {
        ctrl.on_frame(handle);
        fired += 1;
        assert!(fired < 10_000, "animation never settled");
    }
    fired
}

fn approx(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

#[test]
fn fit_centers_image_with_padding() {
    let ctrl = fitted_controller();
    let t = ctrl.transform();
    assert!(approx(t.scale, 0.584, 1e-12));
    assert!(approx(t.x, 108.0, 1e-9));
    assert!(approx(t.y, 8.0, 1e-9));
    assert!(approx(ctrl.zoom_target(), t.scale, 1e-12));
}

#[test]
fn fit_twice_is_idempotent() {
    let mut ctrl = fitted_controller();
    ctrl.fit_to_canvas();
    let first = ctrl.transform();
    ctrl.fit_to_canvas();
    assert_eq!(ctrl.transform(), first);
}

#[test]
fn basic_pan_follows_pointer() {
    let mut ctrl = fitted_controller();
    let start = ctrl.transform();

    ctrl.pointer_down(PointerEvent::primary(100.0, 100.0, 0.0));
    ctrl.pointer_move(PointerEvent::primary(130.0, 115.0, 16.0));

    let t = ctrl.transform();
    assert_eq!(t.x, start.x + 30.0);
    assert_eq!(t.y, start.y + 15.0);
    assert_eq!(t.scale, start.scale);
    assert!(ctrl.is_dragging());
    assert_eq!(ctrl.surface().cursor(), Cursor::Grabbing);
    assert!(ctrl.surface().is_captured(1));
    assert!(ctrl.handler().clicks.is_empty());
}

#[test]
fn press_without_travel_is_a_click() {
    let mut ctrl = fitted_controller();
    let start = ctrl.transform();

    ctrl.pointer_down(PointerEvent::primary(108.0, 8.0, 0.0));
    ctrl.pointer_up(PointerEvent::primary(108.0, 8.0, 50.0));

    let clicks = &ctrl.handler().clicks;
    assert_eq!(clicks.len(), 1);
    assert!(approx(clicks[0].x, 0.0, 1e-9) && approx(clicks[0].y, 0.0, 1e-9));
    assert_eq!(ctrl.transform(), start);
    assert_eq!(ctrl.surface().cursor(), Cursor::Grab);
    assert!(!ctrl.surface().is_captured(1));
}

#[test]
fn jitter_under_threshold_is_still_a_click() {
    let mut ctrl = fitted_controller();
    let start = ctrl.transform();

    // 2px in each axis: squared distance 8 stays under the threshold of 9
    ctrl.pointer_down(PointerEvent::primary(100.0, 100.0, 0.0));
    ctrl.pointer_move(PointerEvent::primary(102.0, 102.0, 16.0));
    ctrl.pointer_up(PointerEvent::primary(102.0, 102.0, 32.0));

    assert_eq!(ctrl.handler().clicks.len(), 1);
    assert_eq!(ctrl.transform(), start);
    assert!(!ctrl.is_coasting());
}

#[test]
fn four_pixels_is_a_drag() {
    let mut ctrl = fitted_controller();
    let start = ctrl.transform();

    ctrl.pointer_down(PointerEvent::primary(100.0, 100.0, 0.0));
    ctrl.pointer_move(PointerEvent::primary(104.0, 100.0, 16.0));
    ctrl.pointer_up(PointerEvent::primary(104.0, 100.0, 16.0));

    assert!(ctrl.handler().clicks.is_empty());
    assert_eq!(ctrl.transform().x, start.x + 4.0);
}

#[test]
fn fast_release_coasts_then_stops() {
    let mut ctrl = fitted_controller();
    let start = ctrl.transform();

    // 5 px/ms at release
    ctrl.pointer_down(PointerEvent::primary(100.0, 100.0, 0.0));
    ctrl.pointer_move(PointerEvent::primary(150.0, 100.0, 10.0));
    ctrl.pointer_up(PointerEvent::primary(150.0, 100.0, 10.0));
    assert!(ctrl.is_coasting());

    let frames = run_frames(&mut ctrl);
    assert!(frames > 10);
    assert!(!ctrl.is_coasting());

    let t = ctrl.transform();
    assert!(t.x > start.x + 50.0 + 500.0, "coasted only to {}", t.x);
    assert_eq!(t.y, start.y);
}

#[test]
fn slow_release_does_not_coast() {
    let mut ctrl = fitted_controller();

    ctrl.pointer_down(PointerEvent::primary(100.0, 100.0, 0.0));
    ctrl.pointer_move(PointerEvent::primary(110.0, 100.0, 1000.0));
    ctrl.pointer_up(PointerEvent::primary(110.0, 100.0, 1000.0));

    assert!(!ctrl.is_coasting());
}

#[test]
fn new_press_stops_coasting() {
    let mut ctrl = fitted_controller();
    ctrl.pointer_down(PointerEvent::primary(100.0, 100.0, 0.0));
    ctrl.pointer_move(PointerEvent::primary(150.0, 100.0, 10.0));
    ctrl.pointer_up(PointerEvent::primary(150.0, 100.0, 10.0));
    assert!(ctrl.is_coasting());

    ctrl.pointer_down(PointerEvent::primary(300.0, 300.0, 20.0));
    assert!(!ctrl.is_coasting());
}

#[test]
fn wheel_zoom_never_leaves_limits() {
    let mut ctrl = fitted_controller();

    for _ in 0..20 {
        ctrl.wheel(WheelEvent::pixels(400.0, 300.0, -5000.0));
        assert!(ctrl.zoom_target() <= MAX_SCALE);
        if let Some(handle) = ctrl.frames_mut().take_next() {
            ctrl.on_frame(handle);
        }
        assert!(ctrl.transform().scale <= MAX_SCALE);
    }
    run_frames(&mut ctrl);
    assert_eq!(ctrl.transform().scale, MAX_SCALE);

    for _ in 0..20 {
        ctrl.wheel(WheelEvent::pixels(400.0, 300.0, 5000.0));
        assert!(ctrl.zoom_target() >= MIN_SCALE);
    }
    run_frames(&mut ctrl);
    assert_eq!(ctrl.transform().scale, MIN_SCALE);
    assert!(!ctrl.is_zooming());
}

#[test]
fn zoom_keeps_point_under_cursor() {
    let mut ctrl = fitted_controller();
    let cursor = Point::new(300.0, 200.0);
    let image_point = ctrl.transform().screen_to_image(cursor.x, cursor.y);

    for _ in 0..3 {
        ctrl.wheel(WheelEvent::pixels(cursor.x, cursor.y, -100.0));
    }
    run_frames(&mut ctrl);

    let t = ctrl.transform();
    assert!(t.scale > 0.584);
    let back = t.image_to_screen(image_point.x, image_point.y);
    assert!(approx(back.x, cursor.x, 1e-6));
    assert!(approx(back.y, cursor.y, 1e-6));
}

#[test]
fn drag_during_zoom_animation_does_not_jump() {
    let mut ctrl = fitted_controller();
    ctrl.wheel(WheelEvent::pixels(400.0, 300.0, -300.0));

    ctrl.pointer_down(PointerEvent::primary(400.0, 300.0, 0.0));
    ctrl.pointer_move(PointerEvent::primary(410.0, 300.0, 16.0));
    for _ in 0..5 {
        let handle = ctrl.frames_mut().take_next().unwrap();
        ctrl.on_frame(handle);
    }
    assert!(ctrl.is_zooming());
    let before = ctrl.transform();

    ctrl.pointer_move(PointerEvent::primary(411.0, 300.0, 32.0));

    let after = ctrl.transform();
    assert!(approx(after.x - before.x, 1.0, 1e-9));
    assert!(approx(after.y, before.y, 1e-9));
    assert_eq!(after.scale, before.scale);
}

#[test]
fn line_and_page_deltas_are_scaled() {
    let mut lines = fitted_controller();
    lines.wheel(WheelEvent {
        x: 0.0,
        y: 0.0,
        delta_y: -3.0,
        mode: WheelDeltaMode::Line,
    });

    let mut pixels = fitted_controller();
    pixels.wheel(WheelEvent::pixels(0.0, 0.0, -48.0));
    assert!(approx(lines.zoom_target(), pixels.zoom_target(), 1e-12));

    let mut page = fitted_controller();
    page.wheel(WheelEvent {
        x: 0.0,
        y: 0.0,
        delta_y: 0.1,
        mode: WheelDeltaMode::Page,
    });
    let mut page_pixels = fitted_controller();
    page_pixels.wheel(WheelEvent::pixels(0.0, 0.0, 60.0));
    assert!(approx(page.zoom_target(), page_pixels.zoom_target(), 1e-12));
}

#[test]
fn draw_requests_coalesce_into_one_frame() {
    let mut ctrl = fitted_controller();

    for _ in 0..5 {
        ctrl.request_draw();
    }
    assert_eq!(ctrl.frames_mut().pending_count(), 1);

    run_frames(&mut ctrl);
    assert_eq!(ctrl.surface().draw_count(), 1);
}

#[test]
fn hidden_canvas_defers_drawing() {
    let mut ctrl = fitted_controller();
    let draws_before = ctrl.handler().after_draws;

    ctrl.set_visible(false);
    ctrl.request_draw();
    ctrl.request_draw();
    assert_eq!(ctrl.frames_mut().pending_count(), 0);

    ctrl.set_visible(true);
    run_frames(&mut ctrl);
    assert_eq!(ctrl.surface().draw_count(), 1);
    assert_eq!(ctrl.handler().after_draws, draws_before + 1);
}

#[test]
fn backing_buffer_tracks_device_pixels() {
    let mut ctrl = CanvasController::new(
        RecordingSurface::new(400.0, 300.0).with_dpr(2.0),
        ManualFrames::new(),
        ClickRecorder::default(),
    );
    ctrl.set_image(TestImage::new(384.0, 284.0));
    run_frames(&mut ctrl);
    ctrl.request_draw();
    run_frames(&mut ctrl);

    let ops = ctrl.surface().ops();
    let resizes: Vec<_> = ops
        .iter()
        .filter(|op| matches!(op, DrawOp::SetBufferSize(..)))
        .collect();
    assert_eq!(resizes, vec![&DrawOp::SetBufferSize(800, 600)]);

    // 384x284 fits exactly inside the padding at scale 1
    assert!(ops.contains(&DrawOp::SetTransform {
        scale: 2.0,
        tx: 16.0,
        ty: 16.0
    }));
}

#[test]
fn destroy_cancels_everything() {
    let mut ctrl = fitted_controller();
    ctrl.wheel(WheelEvent::pixels(400.0, 300.0, -100.0));
    let handle = ctrl.frames_mut().take_next();
    ctrl.wheel(WheelEvent::pixels(400.0, 300.0, -100.0));

    ctrl.destroy();
    assert!(ctrl.is_destroyed());
    assert_eq!(ctrl.frames_mut().pending_count(), 0);

    let before = ctrl.transform();
    if let Some(handle) = handle {
        ctrl.on_frame(handle);
    }
    ctrl.pointer_down(PointerEvent::primary(10.0, 10.0, 0.0));
    ctrl.pointer_move(PointerEvent::primary(100.0, 100.0, 10.0));
    ctrl.request_draw();

    assert_eq!(ctrl.transform(), before);
    assert!(!ctrl.is_dragging());
    assert_eq!(ctrl.frames_mut().pending_count(), 0);
    assert_eq!(ctrl.surface().draw_count(), 0);
}

#[test]
fn late_image_load_is_ignored() {
    let mut ctrl = fitted_controller();
    let old = ctrl.begin_image_load();
    let new = ctrl.begin_image_load();

    assert!(!ctrl.finish_image_load(old, Some(TestImage::new(10.0, 10.0))));
    assert_eq!(ctrl.image(), Some(&TestImage::new(1000.0, 1000.0)));

    assert!(ctrl.finish_image_load(new, Some(TestImage::new(200.0, 100.0))));
    assert_eq!(ctrl.image(), Some(&TestImage::new(200.0, 100.0)));
}

fn page_controller() -> TestController<PageOverlay> {
    let mut ctrl = CanvasController::new(
        RecordingSurface::new(800.0, 600.0),
        ManualFrames::new(),
        PageOverlay::new(),
    );
    let ticket = ctrl.show_page(Arc::new(sample_page(0)), vec![], None);
    assert!(ctrl.finish_page_image(ticket, Some(TestImage::new(100.0, 100.0))));
    run_frames(&mut ctrl);
    ctrl.surface_mut().take_ops();
    ctrl
}

#[test]
fn hovering_a_line_shows_pointer_and_click_selects_it() {
    let mut ctrl = page_controller();

    // Image is drawn at scale 5.84 from (108, 8); this is inside line l0
    ctrl.pointer_move(PointerEvent::primary(400.0, 50.0, 0.0));
    assert_eq!(ctrl.surface().cursor(), Cursor::Pointer);

    ctrl.pointer_down(PointerEvent::primary(400.0, 50.0, 10.0));
    ctrl.pointer_up(PointerEvent::primary(400.0, 50.0, 20.0));
    assert_eq!(
        ctrl.handler_mut().take_events(),
        vec![OverlayEvent::LineSelected {
            page: 0,
            line_id: "l0".into()
        }]
    );

    ctrl.pointer_move(PointerEvent::primary(5.0, 590.0, 30.0));
    assert_eq!(ctrl.surface().cursor(), Cursor::Grab);
}

#[test]
fn failed_image_still_draws_overlay() {
    let mut ctrl = CanvasController::new(
        RecordingSurface::new(800.0, 600.0),
        ManualFrames::new(),
        PageOverlay::new(),
    );
    let ticket = ctrl.show_page(Arc::new(sample_page(0)), vec!["l1".to_string()], None);
    assert!(ctrl.finish_page_image(ticket, None));
    assert!(ctrl.handler_mut().select_line("l0"));
    ctrl.request_draw();
    run_frames(&mut ctrl);

    let ops = ctrl.surface().ops();
    assert!(!ops.iter().any(|op| matches!(op, DrawOp::DrawImage(_))));
    assert_eq!(ctrl.surface().polygons_drawn().len(), 2);
}

#[test]
fn reveal_line_pans_offscreen_line_into_view() {
    let mut ctrl = page_controller();
    ctrl.center_on(100.0, 100.0);
    assert!(!ctrl.is_point_visible(50.0, 10.0, 20.0));

    assert!(ctrl.reveal_line("l0", 20.0));
    assert!(ctrl.is_point_visible(50.0, 10.0, 20.0));
    assert!(!ctrl.reveal_line("missing", 20.0));
}
