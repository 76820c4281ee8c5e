//! Tracked element types and their load lifecycle.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::geometry::Rect;

/// Host-assigned identity of a visual element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl ElementId {
    /// Creates a new id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ElementId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A scroll container: the viewport itself or a scrollable ancestor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContainerId {
    /// The top-level viewport.
    Viewport,
    /// A scrollable element.
    Element(ElementId),
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Viewport => write!(f, "viewport"),
            Self::Element(id) => write!(f, "container {id}"),
        }
    }
}

/// Where the resolved URL is written when an element is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindTarget {
    /// The element's own image source.
    #[default]
    Source,
    /// A style property such as `background-image`.
    Style(String),
}

/// Source description supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Target image URL.
    pub src: String,
    /// Placeholder shown while loading.
    #[serde(default)]
    pub loading: Option<String>,
    /// Placeholder shown after a failed load.
    #[serde(default)]
    pub error: Option<String>,
    /// Responsive candidates, `"url 320w, url 640w"`.
    #[serde(default)]
    pub srcset: Option<String>,
    /// CORS mode forwarded to the fetcher.
    #[serde(default)]
    pub cors: Option<String>,
    /// Render target.
    #[serde(default)]
    pub bind: BindTarget,
}

impl SourceSpec {
    /// Creates a spec with only a target URL.
    #[must_use]
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Self::default()
        }
    }

    /// Sets the loading placeholder.
    #[must_use]
    pub fn with_loading(mut self, loading: impl Into<String>) -> Self {
        self.loading = Some(loading.into());
        self
    }

    /// Sets the error placeholder.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Sets responsive candidates.
    #[must_use]
    pub fn with_srcset(mut self, srcset: impl Into<String>) -> Self {
        self.srcset = Some(srcset.into());
        self
    }

    /// Sets the render target.
    #[must_use]
    pub fn with_bind(mut self, bind: BindTarget) -> Self {
        self.bind = bind;
        self
    }
}

impl From<&str> for SourceSpec {
    fn from(src: &str) -> Self {
        Self::new(src)
    }
}

/// Lifecycle of a tracked element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// Registered, fetch not started.
    #[default]
    Idle,
    /// Fetch in flight.
    Loading,
    /// Target image loaded.
    Loaded,
    /// Last fetch failed.
    Errored,
}

impl LoadState {
    /// Returns true once the target image has loaded.
    #[must_use]
    pub const fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded)
    }

    /// Returns true while a fetch is in flight.
    #[must_use]
    pub const fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns true after a failed fetch.
    #[must_use]
    pub const fn is_errored(self) -> bool {
        matches!(self, Self::Errored)
    }

    /// Returns true if no fetch has been attempted for the current source.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded => write!(f, "loaded"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

/// Which image an element shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderKind {
    /// Loading placeholder.
    Loading,
    /// Target image.
    Loaded,
    /// Error placeholder.
    Error,
}

impl RenderKind {
    /// Attribute value used by hosts to tag the element.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error => "error",
        }
    }
}

/// Natural dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageSize {
    /// Natural width in pixels.
    pub width: u32,
    /// Natural height in pixels.
    pub height: u32,
}

impl ImageSize {
    /// Creates a size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Coarse state reported by the performance snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceState {
    /// Not loaded yet (idle or in flight).
    Loading,
    /// Loaded.
    Loaded,
    /// Failed.
    Error,
}

/// One row of the performance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceEntry {
    /// Element id.
    pub element: ElementId,
    /// Current target URL.
    pub src: String,
    /// Coarse state.
    pub state: PerformanceState,
    /// Seconds between fetch start and end; zero unless loaded.
    pub time: f64,
}

/// Timestamps recorded over an element's life.
#[derive(Debug, Clone, Copy)]
pub struct LoadTimings {
    /// Registration time.
    pub init: Instant,
    /// Start of the latest fetch.
    pub load_start: Option<Instant>,
    /// Completion of the successful fetch.
    pub load_end: Option<Instant>,
}

/// A registered element awaiting (or done with) its image load.
#[derive(Debug, Clone)]
pub struct TrackedElement {
    /// Element identity.
    pub id: ElementId,
    /// Target URL after srcset selection and filters.
    pub src: String,
    /// Loading placeholder URL.
    pub loading: String,
    /// Error placeholder URL.
    pub error: String,
    /// CORS mode.
    pub cors: Option<String>,
    /// Render target.
    pub bind: BindTarget,
    /// Nearest scroll container.
    pub container: ContainerId,
    /// Lifecycle state.
    pub state: LoadState,
    /// Fetch attempts made for the current source.
    pub attempt: u32,
    /// Natural size once loaded.
    pub natural: Option<ImageSize>,
    /// Last bounding box seen by a visibility check.
    pub rect: Option<Rect>,
    /// Ticket of the fetch currently in flight.
    pub(crate) pending: Option<u64>,
    /// Exhausted retries were already logged for the current source.
    pub(crate) exhaustion_reported: bool,
    /// Performance timestamps.
    pub timings: LoadTimings,
}

impl TrackedElement {
    /// Creates an idle element.
    #[must_use]
    pub fn new(
        id: ElementId,
        container: ContainerId,
        src: String,
        loading: String,
        error: String,
    ) -> Self {
        Self {
            id,
            src,
            loading,
            error,
            cors: None,
            bind: BindTarget::Source,
            container,
            state: LoadState::Idle,
            attempt: 0,
            natural: None,
            rect: None,
            pending: None,
            exhaustion_reported: false,
            timings: LoadTimings {
                init: Instant::now(),
                load_start: None,
                load_end: None,
            },
        }
    }

    /// Replaces the URLs. A different target resets the attempt counter and
    /// lifecycle and abandons any fetch in flight. Returns whether it changed.
    pub fn apply_source(&mut self, src: String, loading: String, error: String) -> bool {
        let changed = self.src != src;
        self.src = src;
        self.loading = loading;
        self.error = error;

        if changed {
            self.attempt = 0;
            self.state = LoadState::Idle;
            self.natural = None;
            self.pending = None;
            self.exhaustion_reported = false;
            self.timings.load_start = None;
            self.timings.load_end = None;
        }

        changed
    }

    /// URL shown for the given render kind.
    #[must_use]
    pub fn url_for(&self, kind: RenderKind) -> &str {
        match kind {
            RenderKind::Loading => &self.loading,
            RenderKind::Loaded => &self.src,
            RenderKind::Error => &self.error,
        }
    }

    /// Snapshot row for this element.
    #[must_use]
    pub fn performance(&self) -> PerformanceEntry {
        let (state, time) = match self.state {
            LoadState::Loaded => {
                let time = match (self.timings.load_start, self.timings.load_end) {
                    (Some(start), Some(end)) => end.saturating_duration_since(start).as_secs_f64(),
                    _ => 0.0,
                };
                (PerformanceState::Loaded, time)
            }
            LoadState::Errored => (PerformanceState::Error, 0.0),
            LoadState::Idle | LoadState::Loading => (PerformanceState::Loading, 0.0),
        };

        PerformanceEntry {
            element: self.id,
            src: self.src.clone(),
            state,
            time,
        }
    }
}
