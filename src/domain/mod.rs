//! Domain layer with core entities, options, and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Manager options.
pub mod options;
/// Port definitions.
pub mod ports;

pub use entities::{ElementId, LoadState, SourceSpec};
pub use errors::LazyError;
pub use options::{LazyOptions, VisibilityMode};
pub use ports::{HostPort, ImageFetchPort};
