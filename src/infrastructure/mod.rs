//! Infrastructure layer with host and network adapters.

/// Application configuration.
pub mod config;
/// Image fetching and the loaded-URL cache.
pub mod image;
/// Simulated page host.
pub mod page;

pub use config::{AppConfig, CliArgs, ConfigError, LogLevel, StorageManager, ViewerConfig};
pub use image::{CacheStats, FetcherConfig, HttpImageFetcher, LoadCache};
pub use page::{PageError, PageFetcher, PageModel, SimulatedHost};
