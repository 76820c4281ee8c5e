//! Port definition for image fetching.

use async_trait::async_trait;

use crate::domain::entities::ImageSize;

/// Result type for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Errors that can occur while fetching an image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Request had no URL.
    #[error("image src is required")]
    MissingSource,
    /// Transport failure.
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Non-success HTTP status.
    #[error("HTTP {0}")]
    HttpStatus(u16),
    /// Payload is not a decodable image.
    #[error("Decode error: {0}")]
    DecodeError(String),
    /// Malformed `data:` URI.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),
}

impl FetchError {
    /// Returns whether another attempt could plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError(_) => true,
            Self::HttpStatus(status) => *status == 429 || *status >= 500,
            Self::MissingSource | Self::DecodeError(_) | Self::InvalidDataUri(_) => false,
        }
    }
}

/// A single image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// URL to fetch.
    pub src: String,
    /// CORS mode, if any.
    pub cors: Option<String>,
}

impl FetchRequest {
    /// Creates a request without CORS mode.
    #[must_use]
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            cors: None,
        }
    }
}

/// Port for the host's image fetch primitive.
///
/// Success reports the natural dimensions of the decoded image.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageFetchPort: Send + Sync {
    /// Fetches and decodes an image.
    async fn fetch(&self, request: FetchRequest) -> FetchResult<ImageSize>;
}

#[cfg(test)]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use tokio::sync::Semaphore;

    use super::*;

    /// Fetcher with per-URL outcomes and an optional gate that holds every
    /// fetch until the test releases it.
    pub struct ScriptedFetcher {
        outcomes: Mutex<HashMap<String, FetchResult<ImageSize>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
    }

    impl ScriptedFetcher {
        /// Every URL succeeds with 640x480 unless scripted otherwise.
        pub fn new() -> Self {
            Self {
                outcomes: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        /// Holds fetches until `release` is called.
        pub fn gated() -> Self {
            Self {
                gate: Some(Arc::new(Semaphore::new(0))),
                ..Self::new()
            }
        }

        /// Scripts an outcome for a URL.
        pub fn script(&self, src: &str, outcome: FetchResult<ImageSize>) {
            self.outcomes.lock().insert(src.to_string(), outcome);
        }

        /// Lets `count` held fetches complete.
        pub fn release(&self, count: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(count);
            }
        }

        /// Number of fetches issued.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Default for ScriptedFetcher {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ImageFetchPort for ScriptedFetcher {
        async fn fetch(&self, request: FetchRequest) -> FetchResult<ImageSize> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                let permit = gate
                    .acquire()
                    .await
                    .map_err(|e| FetchError::NetworkError(e.to_string()))?;
                permit.forget();
            }

            self.outcomes
                .lock()
                .get(&request.src)
                .cloned()
                .unwrap_or(Ok(ImageSize::new(640, 480)))
        }
    }
}
