//! Offline fetcher answering from the page's `[[images]]` table.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::domain::entities::ImageSize;
use crate::domain::ports::{FetchError, FetchRequest, FetchResult, ImageFetchPort};
use crate::infrastructure::image::{decode_data_uri, probe_dimensions};

use super::model::{ImageSpec, PageModel};

/// Fetcher for pages run without network access.
///
/// Known URLs answer after their configured latency; unknown URLs fail with
/// HTTP 404. Inline `data:` URIs are decoded for real.
#[derive(Debug, Clone, Default)]
pub struct PageFetcher {
    images: HashMap<String, ImageSpec>,
}

impl PageFetcher {
    /// Builds the answer table from a page.
    #[must_use]
    pub fn new(model: &PageModel) -> Self {
        Self {
            images: model
                .images
                .iter()
                .map(|image| (image.url.clone(), image.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl ImageFetchPort for PageFetcher {
    async fn fetch(&self, request: FetchRequest) -> FetchResult<ImageSize> {
        if request.src.trim().is_empty() {
            return Err(FetchError::MissingSource);
        }
        if request.src.starts_with("data:") {
            return probe_dimensions(&decode_data_uri(&request.src)?);
        }

        let Some(image) = self.images.get(&request.src) else {
            trace!(url = %request.src, "No scripted answer");
            return Err(FetchError::HttpStatus(404));
        };

        if image.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(image.latency_ms)).await;
        }
        if image.fail {
            return Err(FetchError::HttpStatus(404));
        }
        Ok(ImageSize::new(image.width, image.height))
    }
}
