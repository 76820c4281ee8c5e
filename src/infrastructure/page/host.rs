//! In-memory page implementing the host port.
//!
//! Keeps scroll offsets, listener registrations, rendered sources and the
//! observed set behind one lock shared with the observers it creates.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{BindTarget, ContainerId, ElementId, Rect, RenderKind, Viewport};
use crate::domain::options::ObserverOptions;
use crate::domain::ports::{HostPort, IntersectionEntry, VisibilityObserverPort};

use super::model::PageModel;

/// What an element currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Which image.
    pub kind: RenderKind,
    /// URL written to the element.
    pub url: String,
    /// Where it was written.
    pub bind: BindTarget,
}

#[derive(Debug, Clone, Copy)]
struct ObserverConfig {
    margin: f64,
    threshold: f64,
}

#[derive(Debug)]
struct PageState {
    model: PageModel,
    viewport: Viewport,
    page_scroll: f64,
    container_scroll: HashMap<u64, f64>,
    detached: BTreeSet<ElementId>,
    listeners: BTreeMap<ContainerId, Vec<String>>,
    rendered: BTreeMap<ElementId, Rendered>,
    observer_supported: bool,
    observer: Option<ObserverConfig>,
    observed: BTreeMap<ElementId, Option<bool>>,
}

impl PageState {
    fn element_rect(&self, element: ElementId) -> Option<Rect> {
        if self.detached.contains(&element) {
            return None;
        }
        let spec = self.model.elements.iter().find(|e| e.id == element.get())?;

        let rect = match spec.container.and_then(|id| self.model.container(id)) {
            Some(container) => {
                let scroll = self.container_scroll.get(&container.id).copied().unwrap_or(0.0);
                spec.rect.translated(
                    container.rect.left,
                    container.rect.top - scroll - self.page_scroll,
                )
            }
            None => spec.rect.translated(0.0, -self.page_scroll),
        };
        Some(rect)
    }

    fn max_scroll(&self, container: ContainerId) -> f64 {
        match container {
            ContainerId::Viewport => (self.model.document_height() - self.viewport.height).max(0.0),
            ContainerId::Element(id) => self
                .model
                .container(id.get())
                .map_or(0.0, |c| (c.content_height - c.rect.height).max(0.0)),
        }
    }

    fn scroll_of(&self, container: ContainerId) -> f64 {
        match container {
            ContainerId::Viewport => self.page_scroll,
            ContainerId::Element(id) => self.container_scroll.get(&id.get()).copied().unwrap_or(0.0),
        }
    }

    fn intersection(&self, element: ElementId, config: ObserverConfig) -> Option<(bool, f64)> {
        let rect = self.element_rect(element)?;
        let root = Rect::new(
            -config.margin,
            -config.margin,
            self.viewport.width + 2.0 * config.margin,
            self.viewport.height + 2.0 * config.margin,
        );

        let ratio = match rect.intersection(&root) {
            Some(overlap) if rect.area() > 0.0 => overlap.area() / rect.area(),
            Some(_) => 1.0,
            None => 0.0,
        };
        Some((ratio > 0.0 && ratio >= config.threshold, ratio))
    }
}

/// Simulated page. Cloning shares the same page.
#[derive(Debug, Clone)]
pub struct SimulatedHost {
    state: Arc<Mutex<PageState>>,
}

impl SimulatedHost {
    /// Creates a page scrolled to the top.
    #[must_use]
    pub fn new(model: PageModel) -> Self {
        let state = PageState {
            viewport: model.viewport.viewport(),
            observer_supported: model.viewport.observer,
            model,
            page_scroll: 0.0,
            container_scroll: HashMap::new(),
            detached: BTreeSet::new(),
            listeners: BTreeMap::new(),
            rendered: BTreeMap::new(),
            observer: None,
            observed: BTreeMap::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Scrolls `container` by `dy`, clamped to its content. Returns whether
    /// the offset changed.
    pub fn scroll_by(&self, container: ContainerId, dy: f64) -> bool {
        let mut state = self.state.lock();
        let max = state.max_scroll(container);
        let current = state.scroll_of(container);
        let next = (current + dy).clamp(0.0, max);
        if (next - current).abs() < f64::EPSILON {
            return false;
        }

        match container {
            ContainerId::Viewport => state.page_scroll = next,
            ContainerId::Element(id) => {
                state.container_scroll.insert(id.get(), next);
            }
        }
        trace!(%container, offset = next, "Scrolled");
        true
    }

    /// Current scroll offset of `container`.
    #[must_use]
    pub fn scroll_offset(&self, container: ContainerId) -> f64 {
        self.state.lock().scroll_of(container)
    }

    /// Largest scroll offset of `container`.
    #[must_use]
    pub fn max_scroll(&self, container: ContainerId) -> f64 {
        self.state.lock().max_scroll(container)
    }

    /// Resizes the viewport.
    pub fn resize(&self, width: f64, height: f64) {
        self.state.lock().viewport = Viewport::new(width, height);
    }

    /// Removes an element from the page.
    pub fn detach(&self, element: ElementId) {
        let mut state = self.state.lock();
        state.detached.insert(element);
        state.rendered.remove(&element);
        debug!(%element, "Element detached");
    }

    /// Turns the observer capability on or off for observers created later.
    pub fn set_observer_supported(&self, supported: bool) {
        self.state.lock().observer_supported = supported;
    }

    /// Crossings since the last call, like an intersection observer callback.
    ///
    /// Newly observed elements report their initial state once.
    #[must_use]
    pub fn take_intersections(&self) -> Vec<IntersectionEntry> {
        let mut state = self.state.lock();
        let Some(config) = state.observer else {
            return Vec::new();
        };

        let crossings: Vec<(ElementId, bool, f64)> = state
            .observed
            .keys()
            .filter_map(|element| {
                let (intersecting, ratio) = state.intersection(*element, config)?;
                Some((*element, intersecting, ratio))
            })
            .collect();

        let mut entries = Vec::new();
        for (element, intersecting, ratio) in crossings {
            if let Some(last) = state.observed.get_mut(&element)
                && *last != Some(intersecting)
            {
                *last = Some(intersecting);
                entries.push(IntersectionEntry::new(element, intersecting, ratio));
            }
        }
        entries
    }

    /// What `element` shows, if anything was rendered.
    #[must_use]
    pub fn rendered(&self, element: ElementId) -> Option<Rendered> {
        self.state.lock().rendered.get(&element).cloned()
    }

    /// Whether listeners are attached to `container`.
    #[must_use]
    pub fn has_listeners(&self, container: ContainerId) -> bool {
        self.state.lock().listeners.contains_key(&container)
    }

    /// Number of containers with listeners.
    #[must_use]
    pub fn listened_containers(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Elements currently observed.
    #[must_use]
    pub fn observed(&self) -> Vec<ElementId> {
        self.state.lock().observed.keys().copied().collect()
    }

    /// Current position of an element relative to the viewport.
    #[must_use]
    pub fn element_rect(&self, element: ElementId) -> Option<Rect> {
        self.state.lock().element_rect(element)
    }

    /// Page description.
    #[must_use]
    pub fn model(&self) -> PageModel {
        self.state.lock().model.clone()
    }
}

impl HostPort for SimulatedHost {
    fn viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    fn bounding_rect(&self, element: ElementId) -> Option<Rect> {
        self.state.lock().element_rect(element)
    }

    fn scroll_container(&self, element: ElementId) -> ContainerId {
        let state = self.state.lock();
        state
            .model
            .elements
            .iter()
            .find(|e| e.id == element.get())
            .and_then(|e| e.container)
            .map_or(ContainerId::Viewport, |id| {
                ContainerId::Element(ElementId::new(id))
            })
    }

    fn container_width(&self, element: ElementId) -> f64 {
        let state = self.state.lock();
        state
            .model
            .elements
            .iter()
            .find(|e| e.id == element.get())
            .and_then(|e| e.container)
            .and_then(|id| state.model.container(id))
            .map_or(state.viewport.width, |c| c.rect.width)
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.state.lock().model.viewport.dpr
    }

    fn render(&self, element: ElementId, kind: RenderKind, url: &str, bind: &BindTarget) {
        let mut state = self.state.lock();
        if state.detached.contains(&element) {
            return;
        }
        state.rendered.insert(
            element,
            Rendered {
                kind,
                url: url.to_string(),
                bind: bind.clone(),
            },
        );
    }

    fn add_listeners(&self, container: ContainerId, events: &[String]) {
        self.state.lock().listeners.insert(container, events.to_vec());
        debug!(%container, "Listeners added");
    }

    fn remove_listeners(&self, container: ContainerId, _events: &[String]) {
        self.state.lock().listeners.remove(&container);
        debug!(%container, "Listeners removed");
    }

    fn create_observer(
        &self,
        options: &ObserverOptions,
    ) -> Option<Box<dyn VisibilityObserverPort>> {
        let mut state = self.state.lock();
        if !state.observer_supported {
            return None;
        }
        state.observer = Some(ObserverConfig {
            margin: parse_root_margin(&options.root_margin),
            threshold: options.threshold,
        });
        state.observed.clear();

        Some(Box::new(SimulatedObserver {
            state: Arc::clone(&self.state),
        }))
    }
}

/// Observer handle returned by `SimulatedHost::create_observer`.
#[derive(Debug)]
pub struct SimulatedObserver {
    state: Arc<Mutex<PageState>>,
}

impl VisibilityObserverPort for SimulatedObserver {
    fn observe(&mut self, element: ElementId) {
        self.state.lock().observed.entry(element).or_insert(None);
    }

    fn unobserve(&mut self, element: ElementId) {
        self.state.lock().observed.remove(&element);
    }

    fn disconnect(&mut self) {
        let mut state = self.state.lock();
        state.observed.clear();
        state.observer = None;
    }
}

/// Uniform margin from a `rootMargin` value such as `"50px"` or `"50px 0px"`.
/// Only the first length is used; anything unparsable counts as zero.
fn parse_root_margin(value: &str) -> f64 {
    value
        .split_whitespace()
        .next()
        .and_then(|first| first.strip_suffix("px").unwrap_or(first).parse().ok())
        .unwrap_or(0.0)
}
