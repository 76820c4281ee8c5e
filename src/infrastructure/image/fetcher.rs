//! Network image fetcher.
//!
//! Downloads over HTTP(S) and decodes only the image header to learn the
//! natural size. Inline `data:` URIs are decoded locally.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use tracing::{debug, trace};

use crate::domain::entities::ImageSize;
use crate::domain::ports::{FetchError, FetchRequest, FetchResult, ImageFetchPort};

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
        }
    }
}

/// Fetches images with `reqwest`.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
}

impl std::fmt::Debug for HttpImageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpImageFetcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpImageFetcher {
    /// Creates a fetcher.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: FetcherConfig) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::NetworkError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    async fn download(&self, request: &FetchRequest) -> FetchResult<Bytes> {
        let response = self
            .client
            .get(&request.src)
            .send()
            .await
            .map_err(|e| FetchError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::NetworkError(format!("Failed to read body: {e}")))
    }
}

#[async_trait]
impl ImageFetchPort for HttpImageFetcher {
    async fn fetch(&self, request: FetchRequest) -> FetchResult<ImageSize> {
        if request.src.trim().is_empty() {
            return Err(FetchError::MissingSource);
        }

        let bytes = if request.src.starts_with("data:") {
            decode_data_uri(&request.src)?
        } else {
            debug!(url = %request.src, cors = ?request.cors, "Downloading image");
            self.download(&request).await?
        };

        let size = tokio::task::spawn_blocking(move || probe_dimensions(&bytes))
            .await
            .map_err(|e| FetchError::DecodeError(format!("Decode task panicked: {e}")))??;

        trace!(url = %request.src, width = size.width, height = size.height, "Image decoded");
        Ok(size)
    }
}

/// Decodes the payload of a base64 `data:` URI.
///
/// # Errors
/// Returns `FetchError::InvalidDataUri` for anything else.
pub fn decode_data_uri(uri: &str) -> FetchResult<Bytes> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| FetchError::InvalidDataUri("missing data: prefix".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::InvalidDataUri("missing payload".to_string()))?;

    if !meta.ends_with(";base64") {
        return Err(FetchError::InvalidDataUri(
            "only base64 payloads are supported".to_string(),
        ));
    }

    STANDARD
        .decode(payload.trim())
        .map(Bytes::from)
        .map_err(|e| FetchError::InvalidDataUri(e.to_string()))
}

/// Reads the natural size from an encoded image without decoding pixels.
///
/// # Errors
/// Returns `FetchError::DecodeError` if the format is unknown or corrupt.
pub fn probe_dimensions(bytes: &[u8]) -> FetchResult<ImageSize> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FetchError::DecodeError(e.to_string()))?
        .into_dimensions()
        .map_err(|e| FetchError::DecodeError(e.to_string()))?;

    Ok(ImageSize::new(width, height))
}
