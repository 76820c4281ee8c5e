//! TOML description of a page to lazy-load.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::entities::{ElementId, Rect, SourceSpec, Viewport};

use super::PageError;

/// Viewport section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSpec {
    /// Width in CSS pixels.
    pub width: f64,
    /// Height in CSS pixels.
    pub height: f64,
    /// Device pixel ratio.
    pub dpr: f64,
    /// Whether the page offers an intersection observer.
    pub observer: bool,
}

impl Default for ViewportSpec {
    fn default() -> Self {
        let viewport = Viewport::default();
        Self {
            width: viewport.width,
            height: viewport.height,
            dpr: 1.0,
            observer: true,
        }
    }
}

impl ViewportSpec {
    /// Viewport size.
    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }
}

/// A scrollable box inside the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container id; shares the element id space.
    pub id: u64,
    /// Position in document coordinates.
    pub rect: Rect,
    /// Height of the scrollable content.
    pub content_height: f64,
}

/// An image element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    /// Element id.
    pub id: u64,
    /// Scroll container id; the viewport when absent.
    #[serde(default)]
    pub container: Option<u64>,
    /// Position in document coordinates, or in the container's content.
    pub rect: Rect,
    /// Image source.
    #[serde(flatten)]
    pub source: SourceSpec,
}

impl ElementSpec {
    /// Element id.
    #[must_use]
    pub const fn element_id(&self) -> ElementId {
        ElementId::new(self.id)
    }
}

/// How the scripted fetcher answers for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Image URL.
    pub url: String,
    /// Natural width.
    #[serde(default)]
    pub width: u32,
    /// Natural height.
    #[serde(default)]
    pub height: u32,
    /// Answer with HTTP 404 instead.
    #[serde(default)]
    pub fail: bool,
    /// Simulated download time.
    #[serde(default)]
    pub latency_ms: u64,
}

/// Whole page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageModel {
    /// Title shown by the viewer.
    pub title: Option<String>,
    /// Viewport.
    pub viewport: ViewportSpec,
    /// Scroll containers.
    pub containers: Vec<ContainerSpec>,
    /// Image elements.
    pub elements: Vec<ElementSpec>,
    /// Scripted image answers for offline runs.
    pub images: Vec<ImageSpec>,
}

impl PageModel {
    /// Reads and validates a page file.
    ///
    /// # Errors
    /// Returns `PageError` if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, PageError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a page description.
    ///
    /// # Errors
    /// Returns `PageError` on malformed TOML or inconsistent ids.
    pub fn from_toml_str(content: &str) -> Result<Self, PageError> {
        let model: Self = toml::from_str(content)?;
        model.validate()?;
        Ok(model)
    }

    /// Checks id uniqueness and container references.
    ///
    /// # Errors
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), PageError> {
        let mut ids = HashSet::new();
        for id in self
            .containers
            .iter()
            .map(|c| c.id)
            .chain(self.elements.iter().map(|e| e.id))
        {
            if !ids.insert(id) {
                return Err(PageError::DuplicateId(id));
            }
        }

        for element in &self.elements {
            if let Some(container) = element.container
                && !self.containers.iter().any(|c| c.id == container)
            {
                return Err(PageError::UnknownContainer {
                    element: element.id,
                    container,
                });
            }
        }

        if !(self.viewport.width > 0.0 && self.viewport.height > 0.0 && self.viewport.dpr > 0.0) {
            return Err(PageError::InvalidViewport);
        }
        Ok(())
    }

    /// Container by id.
    #[must_use]
    pub fn container(&self, id: u64) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.id == id)
    }

    /// Height of the document scrolled by the viewport.
    #[must_use]
    pub fn document_height(&self) -> f64 {
        let elements = self
            .elements
            .iter()
            .filter(|e| e.container.is_none())
            .map(|e| e.rect.bottom());
        let containers = self.containers.iter().map(|c| c.rect.bottom());
        elements
            .chain(containers)
            .fold(self.viewport.height, f64::max)
    }
}
