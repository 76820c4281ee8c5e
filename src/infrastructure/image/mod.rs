//! Image handling infrastructure.
//!
//! This module provides:
//! - A bounded record of URLs that already loaded
//! - An HTTP fetcher that probes natural image dimensions

pub mod fetcher;
pub mod load_cache;

pub use fetcher::{FetcherConfig, HttpImageFetcher, decode_data_uri, probe_dimensions};
pub use load_cache::{CacheStats, LoadCache};
