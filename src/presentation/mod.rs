//! Presentation layer with the terminal viewer and headless runner.

/// Event handling.
pub mod events;
/// Viewer front ends.
pub mod ui;
/// Reusable widgets.
pub mod widgets;

pub use ui::{HeadlessReport, PageSession, ViewerApp, run_headless};
