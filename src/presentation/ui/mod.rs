//! Viewer front ends.

mod app;
mod headless;
mod session;

pub use app::ViewerApp;
pub use headless::{HeadlessReport, run_headless};
pub use session::{EventCounts, PageSession, register_page};

use crate::application::services::GalleryFilter;
use crate::infrastructure::config::ViewerConfig;

/// Gallery filter seeded from the configured minimum image size.
fn gallery_filter(config: &ViewerConfig) -> GalleryFilter {
    GalleryFilter::default().with_min_size(config.gallery_min_width, config.gallery_min_height)
}
