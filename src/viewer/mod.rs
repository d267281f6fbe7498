//! Page viewing engine

mod cache;
mod controller;
mod geometry;
mod overlay;
mod request;
mod scheduler;
mod service;
mod session;
mod state;
mod surface;
mod thumbnails;
mod transform;
mod types;
mod worker;

pub use cache::PageCache;
pub use controller::{
    CanvasController, CanvasHandler, Hover, ImageTicket, PointerButton, PointerEvent,
    WheelDeltaMode, WheelEvent,
};
pub use geometry::{
    LayerScale, PolygonHit, build_polygon_hits, build_scaled_polygon_hits,
    find_hit_at_image_coord, parse_polygon_points, point_in_polygon,
};
pub use overlay::{DEFAULT_HIGHLIGHT_COLOR, OverlayEvent, OverlayStyles, PageOverlay};
pub use request::{FetchError, PageRequest, PageResponse, RequestId};
pub use scheduler::{FrameHandle, FrameScheduler, ManualFrames};
pub use service::{Fetch, PageService};
pub use session::{SessionEvent, ViewerSession};
pub use state::{Command, Effect, ViewerState};
pub use surface::{Cursor, ImageSource, PolygonStyle, Surface};
pub use thumbnails::{BatchId, ThumbnailBatchResult, ThumbnailLoader, visible_range};
pub use transform::{FIT_PADDING, MAX_SCALE, MIN_SCALE, ScaleLimits, Transform, fit_to_canvas};
pub use types::*;
