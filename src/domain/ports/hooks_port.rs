//! Extension points around the load lifecycle.

use crate::domain::entities::{ElementId, RenderKind, TrackedElement};
use crate::domain::options::LazyOptions;

/// Callbacks invoked by the manager as elements move through their lifecycle.
pub trait LoadHooks: Send + Sync {
    /// Runs right before a fetch is issued.
    fn before_load(&self, _element: &TrackedElement, _options: &LazyOptions) {}

    /// Runs after the host has been asked to render `kind`.
    fn on_render(&self, _element: &TrackedElement, _kind: RenderKind, _options: &LazyOptions) {}
}

/// Rewrites an element's target URL at registration and update.
pub trait SourceFilter: Send + Sync {
    /// Returns the URL to use for `element`.
    fn filter(&self, element: ElementId, src: String, options: &LazyOptions) -> String;
}
