//! Lazyview - viewport-aware lazy image loading.
//!
//! Tracks image elements on a page, watches their position relative to the
//! viewport (throttled scroll checks or intersection observation) and fetches
//! each image once it comes near. Ships a simulated page host, an offline and
//! an HTTP fetcher, and a terminal viewer.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the lazy manager and its services.
pub mod application;
/// Domain layer containing entities, errors, options and port definitions.
pub mod domain;
/// Infrastructure layer containing configuration, fetchers and the page host.
pub mod infrastructure;
/// Presentation layer containing the viewer and headless runner.
pub mod presentation;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "lazyview";
