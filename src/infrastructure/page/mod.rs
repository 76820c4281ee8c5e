//! Simulated page: a TOML-described document with scroll containers that
//! stands in for a real rendering host.

pub mod fetcher;
pub mod host;
pub mod model;

use thiserror::Error;

pub use fetcher::PageFetcher;
pub use host::{Rendered, SimulatedHost, SimulatedObserver};
pub use model::{ContainerSpec, ElementSpec, ImageSpec, PageModel, ViewportSpec};

/// Errors loading a page description.
#[derive(Debug, Error)]
pub enum PageError {
    /// File could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid TOML for a page.
    #[error("page parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Two containers or elements share an id.
    #[error("duplicate id {0}")]
    DuplicateId(u64),
    /// An element names a container that does not exist.
    #[error("element {element} references unknown container {container}")]
    UnknownContainer {
        /// Element id.
        element: u64,
        /// Missing container id.
        container: u64,
    },
    /// Viewport dimensions or pixel ratio are not positive.
    #[error("viewport width, height and dpr must be positive")]
    InvalidViewport,
}
