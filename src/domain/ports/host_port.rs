//! Port definition for the rendering host.

use crate::domain::entities::{BindTarget, ContainerId, ElementId, Rect, RenderKind, Viewport};
use crate::domain::options::ObserverOptions;

use super::observer_port::VisibilityObserverPort;

/// Layout queries and side effects the manager needs from its host.
///
/// All calls are synchronous; the host is expected to answer from its
/// current layout without suspending.
pub trait HostPort: Send + Sync {
    /// Current viewport size.
    fn viewport(&self) -> Viewport;

    /// Bounding box relative to the viewport, or `None` once the element is
    /// detached from the document.
    fn bounding_rect(&self, element: ElementId) -> Option<Rect>;

    /// Nearest scrollable ancestor, or the viewport.
    fn scroll_container(&self, element: ElementId) -> ContainerId;

    /// Width of the element's parent, used for srcset selection.
    fn container_width(&self, element: ElementId) -> f64;

    /// Device pixel ratio.
    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }

    /// Shows `url` on the element.
    fn render(&self, element: ElementId, kind: RenderKind, url: &str, bind: &BindTarget);

    /// Subscribes the manager to `events` on a container.
    fn add_listeners(&self, container: ContainerId, events: &[String]);

    /// Unsubscribes the manager from `events` on a container.
    fn remove_listeners(&self, container: ContainerId, events: &[String]);

    /// Creates an intersection observer, or `None` if the host has none.
    fn create_observer(&self, options: &ObserverOptions)
    -> Option<Box<dyn VisibilityObserverPort>>;
}

#[cfg(test)]
pub mod mock {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct MockHostState {
        viewport: Option<Viewport>,
        rects: HashMap<ElementId, Rect>,
        containers: HashMap<ElementId, ContainerId>,
        listeners: HashMap<ContainerId, usize>,
        listener_calls: usize,
        renders: Vec<(ElementId, RenderKind, String)>,
        observer_supported: bool,
        observers_created: usize,
    }

    /// In-memory host for tests.
    ///
    /// Listener attachments are counted per container so double attachment
    /// shows up as a count above one.
    #[derive(Clone, Default)]
    pub struct MockHost {
        state: Arc<Mutex<MockHostState>>,
        observed: Arc<Mutex<BTreeSet<ElementId>>>,
    }

    impl MockHost {
        /// Creates a 1000x800 host without observer support.
        pub fn new() -> Self {
            let host = Self::default();
            host.state.lock().viewport = Some(Viewport::new(1000.0, 800.0));
            host
        }

        /// Enables the intersection observer capability.
        pub fn with_observer(self) -> Self {
            self.state.lock().observer_supported = true;
            self
        }

        /// Places an element.
        pub fn place(&self, element: ElementId, rect: Rect) {
            self.state.lock().rects.insert(element, rect);
        }

        /// Places an element inside a scroll container.
        pub fn place_in(&self, element: ElementId, rect: Rect, container: ContainerId) {
            let mut state = self.state.lock();
            state.rects.insert(element, rect);
            state.containers.insert(element, container);
        }

        /// Removes an element from the document.
        pub fn detach(&self, element: ElementId) {
            self.state.lock().rects.remove(&element);
        }

        /// Number of live listener attachments on a container.
        pub fn listener_count(&self, container: ContainerId) -> usize {
            self.state
                .lock()
                .listeners
                .get(&container)
                .copied()
                .unwrap_or(0)
        }

        /// Total number of containers with listeners.
        pub fn listened_containers(&self) -> usize {
            self.state.lock().listeners.values().filter(|c| **c > 0).count()
        }

        /// Number of add/remove listener calls made so far.
        pub fn listener_calls(&self) -> usize {
            self.state.lock().listener_calls
        }

        /// Render calls for an element, oldest first.
        pub fn renders_for(&self, element: ElementId) -> Vec<(RenderKind, String)> {
            self.state
                .lock()
                .renders
                .iter()
                .filter(|(id, _, _)| *id == element)
                .map(|(_, kind, url)| (*kind, url.clone()))
                .collect()
        }

        /// Last render kind for an element.
        pub fn last_render(&self, element: ElementId) -> Option<RenderKind> {
            self.renders_for(element).last().map(|(kind, _)| *kind)
        }

        /// Elements currently observed.
        pub fn observed(&self) -> BTreeSet<ElementId> {
            self.observed.lock().clone()
        }

        /// Observers created so far.
        pub fn observers_created(&self) -> usize {
            self.state.lock().observers_created
        }
    }

    impl HostPort for MockHost {
        fn viewport(&self) -> Viewport {
            self.state.lock().viewport.unwrap_or_default()
        }

        fn bounding_rect(&self, element: ElementId) -> Option<Rect> {
            self.state.lock().rects.get(&element).copied()
        }

        fn scroll_container(&self, element: ElementId) -> ContainerId {
            self.state
                .lock()
                .containers
                .get(&element)
                .copied()
                .unwrap_or(ContainerId::Viewport)
        }

        fn container_width(&self, _element: ElementId) -> f64 {
            400.0
        }

        fn render(&self, element: ElementId, kind: RenderKind, url: &str, _bind: &BindTarget) {
            self.state
                .lock()
                .renders
                .push((element, kind, url.to_string()));
        }

        fn add_listeners(&self, container: ContainerId, _events: &[String]) {
            let mut state = self.state.lock();
            state.listener_calls += 1;
            *state.listeners.entry(container).or_insert(0) += 1;
        }

        fn remove_listeners(&self, container: ContainerId, _events: &[String]) {
            let mut state = self.state.lock();
            state.listener_calls += 1;
            if let Some(count) = state.listeners.get_mut(&container) {
                *count = count.saturating_sub(1);
            }
        }

        fn create_observer(
            &self,
            _options: &ObserverOptions,
        ) -> Option<Box<dyn VisibilityObserverPort>> {
            let mut state = self.state.lock();
            if !state.observer_supported {
                return None;
            }
            state.observers_created += 1;
            Some(Box::new(MockObserver {
                observed: Arc::clone(&self.observed),
            }))
        }
    }

    /// Observer that records the observed set on its host.
    pub struct MockObserver {
        observed: Arc<Mutex<BTreeSet<ElementId>>>,
    }

    impl VisibilityObserverPort for MockObserver {
        fn observe(&mut self, element: ElementId) {
            self.observed.lock().insert(element);
        }

        fn unobserve(&mut self, element: ElementId) {
            self.observed.lock().remove(&element);
        }

        fn disconnect(&mut self) {
            self.observed.lock().clear();
        }
    }
}
