mod gallery_panel;
mod page_view;
mod status_bar;

pub use gallery_panel::GalleryPanel;
pub use page_view::{ElementBox, PageView, project, state_color};
pub use status_bar::{LoadCounts, StatusBar, StatusLevel};
