// Export modules for use in tests
pub mod context;
pub mod loader;
pub mod panic_handler;
pub mod search;
pub mod settings;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use context::{ContextReporter, ContextSession, ContextSummary};
pub use settings::Settings;
pub use viewer::{CanvasController, PageOverlay, PageService, ThumbnailLoader, ViewerSession};
