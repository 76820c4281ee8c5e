//! Port definition for host-native visibility observation.

use crate::domain::entities::ElementId;

/// One visibility crossing reported by an observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    /// Observed element.
    pub target: ElementId,
    /// Whether the element now intersects the observer root.
    pub is_intersecting: bool,
    /// Visible fraction of the element's area.
    pub ratio: f64,
}

impl IntersectionEntry {
    /// Creates an entry.
    #[must_use]
    pub const fn new(target: ElementId, is_intersecting: bool, ratio: f64) -> Self {
        Self {
            target,
            is_intersecting,
            ratio,
        }
    }
}

/// Handle to an intersection observer created by the host.
///
/// Crossings are delivered back to the manager through
/// `LazyManager::handle_intersections`.
pub trait VisibilityObserverPort: Send {
    /// Starts watching an element.
    fn observe(&mut self, element: ElementId);

    /// Stops watching an element.
    fn unobserve(&mut self, element: ElementId);

    /// Stops watching everything.
    fn disconnect(&mut self);
}
