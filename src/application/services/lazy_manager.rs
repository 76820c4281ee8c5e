//! Lazy visibility manager.
//!
//! Owns every tracked element and decides when each one starts fetching its
//! image. All state lives on the owning task; fetches run as spawned tasks
//! and report back through a channel drained by the owner.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace, warn};

use crate::domain::entities::{
    ContainerId, ElementId, ImageSize, LoadState, PerformanceEntry, RenderKind, SourceSpec,
    TrackedElement,
};
use crate::domain::errors::LazyError;
use crate::domain::options::{LazyOptions, VisibilityMode};
use crate::domain::ports::{
    FetchRequest, FetchResult, HostPort, ImageFetchPort, IntersectionEntry, LoadHooks,
    SourceFilter,
};
use crate::infrastructure::image::{CacheStats, LoadCache};

use super::container_registry::ContainerRegistry;
use super::source::select_from_srcset;
use super::throttle::{Throttle, ThrottleDecision};
use super::visibility::VisibilityStrategy;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle notification, one per render.
#[derive(Debug, Clone, PartialEq)]
pub enum LazyEvent {
    /// Loading placeholder shown.
    Loading {
        /// Element.
        element: ElementId,
        /// Target URL.
        src: String,
    },
    /// Target image shown.
    Loaded {
        /// Element.
        element: ElementId,
        /// Target URL.
        src: String,
        /// Natural size when known.
        size: Option<ImageSize>,
        /// Served from the load cache without a fetch.
        from_cache: bool,
    },
    /// Error placeholder shown.
    Error {
        /// Element.
        element: ElementId,
        /// Target URL.
        src: String,
        /// Attempts made so far.
        attempt: u32,
    },
}

/// Message sent when a fetch finishes.
#[derive(Debug, Clone)]
pub struct FetchCompletion {
    /// Element the fetch was issued for.
    pub element: ElementId,
    ticket: u64,
    /// Outcome.
    pub result: FetchResult<ImageSize>,
}

/// Result of a `load` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fetch issued.
    Started,
    /// URL was cached; element is loaded.
    CacheHit,
    /// Nothing to do: already loaded.
    AlreadyLoaded,
    /// Nothing to do: fetch in flight.
    InFlight,
    /// Nothing to do: attempts exhausted.
    Exhausted,
}

/// What applying a completion did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Element is now loaded.
    Loaded,
    /// Element is now errored.
    Errored,
    /// Element gone or its source changed; nothing mutated.
    Discarded,
}

/// Summary of one visibility pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Elements inside the preload area and not yet loaded.
    pub visible: Vec<ElementId>,
    /// Elements dropped because they left the document.
    pub removed: Vec<ElementId>,
}

/// Tracks elements and loads their images once they come near the viewport.
pub struct LazyManager {
    options: LazyOptions,
    scale: f64,
    host: Arc<dyn HostPort>,
    fetcher: Arc<dyn ImageFetchPort>,
    elements: BTreeMap<ElementId, TrackedElement>,
    containers: ContainerRegistry,
    cache: LoadCache,
    strategy: VisibilityStrategy,
    throttle: Throttle<()>,
    hooks: Vec<Arc<dyn LoadHooks>>,
    filters: Vec<Arc<dyn SourceFilter>>,
    event_tx: broadcast::Sender<LazyEvent>,
    completion_tx: mpsc::UnboundedSender<FetchCompletion>,
    completion_rx: mpsc::UnboundedReceiver<FetchCompletion>,
    in_flight: usize,
    next_ticket: u64,
}

impl std::fmt::Debug for LazyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyManager")
            .field("mode", &self.strategy)
            .field("tracked", &self.elements.len())
            .field("in_flight", &self.in_flight)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl LazyManager {
    /// Creates a manager and installs the configured visibility mode.
    ///
    /// # Errors
    /// Returns `LazyError::InvalidOption` if the options fail validation.
    pub fn new(
        options: LazyOptions,
        host: Arc<dyn HostPort>,
        fetcher: Arc<dyn ImageFetchPort>,
    ) -> Result<Self, LazyError> {
        options.validate()?;

        let scale = options.scale.unwrap_or_else(|| host.device_pixel_ratio());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let mut manager = Self {
            cache: LoadCache::new(options.cache_capacity),
            throttle: Throttle::new(options.throttle_wait()),
            options,
            scale,
            host,
            fetcher,
            elements: BTreeMap::new(),
            containers: ContainerRegistry::new(),
            strategy: VisibilityStrategy::Stopped,
            hooks: Vec::new(),
            filters: Vec::new(),
            event_tx,
            completion_tx,
            completion_rx,
            in_flight: 0,
            next_ticket: 0,
        };
        manager.set_mode(manager.options.preferred_mode());
        Ok(manager)
    }

    /// Adds lifecycle hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn LoadHooks>) -> Self {
        self.hooks.push(hooks);
        self
    }

    /// Adds a source filter, applied in insertion order.
    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn SourceFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sizes the lifecycle event buffer, never below the default of 256.
    /// Receivers subscribed earlier are detached, so call this before
    /// `subscribe`.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(EVENT_CHANNEL_CAPACITY));
        self.event_tx = event_tx;
        self
    }

    /// Subscribes to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LazyEvent> {
        self.event_tx.subscribe()
    }

    /// Starts tracking `element`, or updates it if already tracked.
    ///
    /// # Errors
    /// Returns `LazyError::MissingSource` when `spec.src` is blank; nothing
    /// is tracked in that case.
    pub fn register(&mut self, element: ElementId, spec: SourceSpec) -> Result<(), LazyError> {
        if self.elements.contains_key(&element) {
            return self.update(element, spec);
        }

        let src = self.resolve_src(element, &spec)?;
        let container = self.host.scroll_container(element);
        let (loading, error) = self.placeholders(&spec);

        let mut tracked = TrackedElement::new(element, container, src, loading, error);
        tracked.cors = spec.cors;
        tracked.bind = spec.bind;
        self.elements.insert(element, tracked);

        let listen = self.strategy.listens_for_events();
        let events = &self.options.listen_events;
        self.containers
            .acquire(ContainerId::Viewport, listen, self.host.as_ref(), events);
        self.containers
            .acquire(container, listen, self.host.as_ref(), events);
        self.strategy.notify_registration(element);

        debug!(%element, %container, "Registered element");
        self.render(element, RenderKind::Loading, false);
        self.request_check(Instant::now());
        Ok(())
    }

    /// Applies new URLs to a tracked element, registering it if unknown.
    ///
    /// A different target URL resets the attempt count and state to idle;
    /// a fetch still in flight for the old URL is ignored when it lands.
    ///
    /// # Errors
    /// Returns `LazyError::MissingSource` when `spec.src` is blank.
    pub fn update(&mut self, element: ElementId, spec: SourceSpec) -> Result<(), LazyError> {
        if !self.elements.contains_key(&element) {
            return self.register(element, spec);
        }

        let src = self.resolve_src(element, &spec)?;
        let (loading, error) = self.placeholders(&spec);

        let Some(tracked) = self.elements.get_mut(&element) else {
            return Err(LazyError::unknown(element));
        };
        if tracked.apply_source(src, loading, error) {
            debug!(%element, src = %tracked.src, "Source changed, state reset");
        }
        tracked.bind = spec.bind;
        tracked.cors = spec.cors;

        self.strategy.notify_update(element);
        self.request_check(Instant::now());
        Ok(())
    }

    /// Stops tracking `element`. Unknown elements are ignored.
    pub fn unregister(&mut self, element: ElementId) {
        let Some(tracked) = self.elements.remove(&element) else {
            return;
        };

        self.strategy.notify_done(element);
        let events = &self.options.listen_events;
        self.containers
            .release(tracked.container, self.host.as_ref(), events);
        self.containers
            .release(ContainerId::Viewport, self.host.as_ref(), events);

        debug!(%element, "Unregistered element");
    }

    /// Checks every tracked element against the preload area and starts
    /// loading the ones inside it. Detached elements are dropped.
    pub fn check_visibility(&mut self) -> CheckReport {
        let viewport = self.host.viewport();
        let mut report = CheckReport::default();

        for (id, tracked) in &mut self.elements {
            let Some(rect) = self.host.bounding_rect(*id) else {
                report.removed.push(*id);
                continue;
            };
            tracked.rect = Some(rect);

            if !tracked.state.is_loaded()
                && viewport.is_near(&rect, self.options.preload, self.options.preload_top)
            {
                report.visible.push(*id);
            }
        }

        for id in &report.removed {
            debug!(element = %id, "Element detached, dropping");
            self.unregister(*id);
        }
        for id in &report.visible {
            if let Err(e) = self.load(*id) {
                warn!(element = %id, error = %e, "Load skipped");
            }
        }

        trace!(
            visible = report.visible.len(),
            removed = report.removed.len(),
            "Visibility check done"
        );
        report
    }

    /// Starts loading `element`'s target image.
    ///
    /// # Errors
    /// Returns `LazyError::UnknownElement` if `element` is not tracked.
    pub fn load(&mut self, element: ElementId) -> Result<LoadOutcome, LazyError> {
        let cap = self.options.attempt;
        let silent = self.options.silent;
        let Some(tracked) = self.elements.get_mut(&element) else {
            return Err(LazyError::unknown(element));
        };

        match tracked.state {
            LoadState::Loaded => return Ok(LoadOutcome::AlreadyLoaded),
            LoadState::Loading => return Ok(LoadOutcome::InFlight),
            LoadState::Errored if tracked.attempt >= cap => {
                if !silent && !tracked.exhaustion_reported {
                    warn!(%element, src = %tracked.src, attempts = tracked.attempt, "Attempts exhausted");
                } else {
                    trace!(%element, "Attempts exhausted");
                }
                tracked.exhaustion_reported = true;
                return Ok(LoadOutcome::Exhausted);
            }
            LoadState::Idle | LoadState::Errored => {}
        }

        if let Some(size) = self.cache.lookup(&tracked.src) {
            tracked.state = LoadState::Loaded;
            tracked.natural = Some(size);
            debug!(%element, "Loaded from cache");
            self.render(element, RenderKind::Loaded, true);
            self.strategy.notify_done(element);
            return Ok(LoadOutcome::CacheHit);
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        tracked.state = LoadState::Loading;
        tracked.attempt += 1;
        tracked.pending = Some(ticket);
        tracked.timings.load_start = Some(Instant::now());
        let request = FetchRequest {
            src: tracked.src.clone(),
            cors: tracked.cors.clone(),
        };
        debug!(%element, src = %request.src, attempt = tracked.attempt, "Fetching");

        self.render(element, RenderKind::Loading, false);
        if let Some(tracked) = self.elements.get(&element) {
            for hooks in &self.hooks {
                hooks.before_load(tracked, &self.options);
            }
        }

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.completion_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = fetcher.fetch(request).await;
            let _ = tx.send(FetchCompletion {
                element,
                ticket,
                result,
            });
        });

        Ok(LoadOutcome::Started)
    }

    /// Applies a finished fetch. Stale completions change nothing.
    pub fn apply_completion(&mut self, completion: FetchCompletion) -> CompletionOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);
        let FetchCompletion {
            element,
            ticket,
            result,
        } = completion;

        let Some(tracked) = self.elements.get_mut(&element) else {
            trace!(%element, "Completion for removed element discarded");
            return CompletionOutcome::Discarded;
        };
        if tracked.pending != Some(ticket) {
            trace!(%element, "Stale completion discarded");
            return CompletionOutcome::Discarded;
        }
        tracked.pending = None;

        match result {
            Ok(size) => {
                tracked.state = LoadState::Loaded;
                tracked.natural = Some(size);
                tracked.timings.load_end = Some(Instant::now());
                let src = tracked.src.clone();
                debug!(%element, width = size.width, height = size.height, "Loaded");

                self.render(element, RenderKind::Loaded, false);
                self.cache.insert(src, size);
                self.strategy.notify_done(element);
                CompletionOutcome::Loaded
            }
            Err(e) => {
                tracked.state = LoadState::Errored;
                if !self.options.silent {
                    warn!(%element, src = %tracked.src, error = %e, "Image failed to load");
                } else {
                    debug!(%element, error = %e, "Image failed to load");
                }
                self.render(element, RenderKind::Error, false);
                CompletionOutcome::Errored
            }
        }
    }

    /// Waits for the next fetch to finish. Returns `None` when nothing is in
    /// flight.
    pub async fn next_completion(&mut self) -> Option<FetchCompletion> {
        if self.in_flight == 0 {
            return None;
        }
        self.completion_rx.recv().await
    }

    /// Applies completions that already arrived, without waiting.
    pub fn drain_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.apply_completion(completion);
            applied += 1;
        }
        applied
    }

    /// Waits until every fetch in flight has landed.
    pub async fn settle(&mut self) {
        while let Some(completion) = self.next_completion().await {
            self.apply_completion(completion);
        }
    }

    /// Reports a host event on `container`. Returns true if a check ran now.
    pub fn notify_event(&mut self, container: ContainerId, event: &str, now: Instant) -> bool {
        if !self.strategy.listens_for_events()
            || !self.containers.is_listened(container)
            || !self.options.listen_events.iter().any(|name| name == event)
        {
            return false;
        }
        self.request_check(now)
    }

    /// Runs a parked check whose window has elapsed. Returns true if it ran.
    pub fn poll_throttle(&mut self, now: Instant) -> bool {
        if self.throttle.poll(now).is_some() {
            self.check_visibility();
            true
        } else {
            false
        }
    }

    /// When the parked check becomes due.
    #[must_use]
    pub fn throttle_deadline(&self) -> Option<Instant> {
        self.throttle.deadline()
    }

    /// Handles crossings reported by the host observer.
    pub fn handle_intersections(&mut self, entries: &[IntersectionEntry]) {
        if !matches!(self.strategy, VisibilityStrategy::Observer { .. }) {
            return;
        }

        for entry in entries.iter().filter(|entry| entry.is_intersecting) {
            let Some(state) = self.elements.get(&entry.target).map(|el| el.state) else {
                continue;
            };
            if state.is_loaded() {
                self.strategy.notify_done(entry.target);
            } else if let Err(e) = self.load(entry.target) {
                warn!(element = %entry.target, error = %e, "Load skipped");
            }
        }
    }

    /// Switches visibility detection, keeping every tracked element.
    pub fn set_mode(&mut self, mode: VisibilityMode) {
        if self.strategy.mode() == Some(mode) {
            return;
        }

        let previous = std::mem::replace(&mut self.strategy, VisibilityStrategy::Stopped);
        previous.stop(
            self.host.as_ref(),
            &self.options,
            &mut self.containers,
            self.elements.keys(),
        );
        self.throttle.cancel();

        self.strategy = VisibilityStrategy::start(
            mode,
            self.host.as_ref(),
            &self.options,
            &mut self.containers,
            self.elements.keys(),
        );
        debug!(requested = %mode, active = ?self.strategy, "Visibility mode set");
    }

    /// Active mode.
    #[must_use]
    pub fn mode(&self) -> VisibilityMode {
        self.strategy.mode().unwrap_or_default()
    }

    /// Per-element state and elapsed load time.
    #[must_use]
    pub fn performance(&self) -> Vec<PerformanceEntry> {
        self.elements
            .values()
            .map(TrackedElement::performance)
            .collect()
    }

    /// State of a tracked element.
    #[must_use]
    pub fn state_of(&self, element: ElementId) -> Option<LoadState> {
        self.elements.get(&element).map(|el| el.state)
    }

    /// Tracked element by id.
    #[must_use]
    pub fn get(&self, element: ElementId) -> Option<&TrackedElement> {
        self.elements.get(&element)
    }

    /// Whether `element` is tracked.
    #[must_use]
    pub fn is_tracked(&self, element: ElementId) -> bool {
        self.elements.contains_key(&element)
    }

    /// All tracked elements in id order.
    pub fn elements(&self) -> impl Iterator<Item = &TrackedElement> {
        self.elements.values()
    }

    /// Number of tracked elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Fetches currently in flight, including ones whose element is gone.
    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Container registrations.
    #[must_use]
    pub const fn containers(&self) -> &ContainerRegistry {
        &self.containers
    }

    /// Load cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Whether `url` is in the load cache.
    #[must_use]
    pub fn is_cached(&self, url: &str) -> bool {
        self.cache.contains(url)
    }

    /// Active options.
    #[must_use]
    pub const fn options(&self) -> &LazyOptions {
        &self.options
    }

    fn request_check(&mut self, now: Instant) -> bool {
        match self.throttle.call(now, ()) {
            ThrottleDecision::Run(()) => {
                self.check_visibility();
                true
            }
            ThrottleDecision::Deferred { .. } => false,
        }
    }

    fn resolve_src(&self, element: ElementId, spec: &SourceSpec) -> Result<String, LazyError> {
        if spec.src.trim().is_empty() {
            if !self.options.silent {
                warn!(%element, "Image source is required");
            }
            return Err(LazyError::missing_source(element));
        }

        let mut src = spec
            .srcset
            .as_deref()
            .and_then(|srcset| {
                select_from_srcset(srcset, self.host.container_width(element) * self.scale)
            })
            .unwrap_or_else(|| spec.src.clone());

        for filter in &self.filters {
            src = filter.filter(element, src, &self.options);
        }
        Ok(src)
    }

    fn placeholders(&self, spec: &SourceSpec) -> (String, String) {
        let loading = spec
            .loading
            .clone()
            .unwrap_or_else(|| self.options.loading.clone());
        let error = spec
            .error
            .clone()
            .unwrap_or_else(|| self.options.error.clone());
        (loading, error)
    }

    fn render(&self, element: ElementId, kind: RenderKind, from_cache: bool) {
        let Some(tracked) = self.elements.get(&element) else {
            return;
        };

        self.host
            .render(element, kind, tracked.url_for(kind), &tracked.bind);
        for hooks in &self.hooks {
            hooks.on_render(tracked, kind, &self.options);
        }

        let event = match kind {
            RenderKind::Loading => LazyEvent::Loading {
                element,
                src: tracked.src.clone(),
            },
            RenderKind::Loaded => LazyEvent::Loaded {
                element,
                src: tracked.src.clone(),
                size: tracked.natural,
                from_cache,
            },
            RenderKind::Error => LazyEvent::Error {
                element,
                src: tracked.src.clone(),
                attempt: tracked.attempt,
            },
        };
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::application::services::source::AppendQuery;
    use crate::domain::entities::Rect;
    use crate::domain::ports::FetchError;
    use crate::domain::ports::mocks::{MockHost, MockImageFetchPort, ScriptedFetcher};

    const NEAR: Rect = Rect::new(100.0, 0.0, 100.0, 100.0);
    const FAR: Rect = Rect::new(5000.0, 0.0, 100.0, 100.0);

    fn id(n: u64) -> ElementId {
        ElementId::new(n)
    }

    fn manager_with(
        host: &MockHost,
        fetcher: Arc<dyn ImageFetchPort>,
        options: LazyOptions,
    ) -> LazyManager {
        LazyManager::new(options, Arc::new(host.clone()), fetcher).unwrap()
    }

    fn manager(host: &MockHost, fetcher: Arc<ScriptedFetcher>) -> LazyManager {
        manager_with(host, fetcher, LazyOptions::default())
    }

    #[tokio::test]
    async fn test_visible_element_loads() {
        let host = MockHost::new();
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut manager = manager(&host, fetcher.clone());
        let mut events = manager.subscribe();

        host.place(id(1), NEAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        assert_eq!(manager.state_of(id(1)), Some(LoadState::Loading));

        manager.settle().await;

        assert_eq!(manager.state_of(id(1)), Some(LoadState::Loaded));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(
            host.renders_for(id(1)).last(),
            Some(&(RenderKind::Loaded, "a.jpg".to_string()))
        );
        assert_eq!(
            manager.get(id(1)).and_then(|el| el.natural),
            Some(ImageSize::new(640, 480))
        );
        assert!(manager.is_cached("a.jpg"));

        assert!(matches!(events.try_recv(), Ok(LazyEvent::Loading { .. })));
        assert!(matches!(events.try_recv(), Ok(LazyEvent::Loading { .. })));
        assert_eq!(
            events.try_recv().ok(),
            Some(LazyEvent::Loaded {
                element: id(1),
                src: "a.jpg".to_string(),
                size: Some(ImageSize::new(640, 480)),
                from_cache: false,
            })
        );

        let perf = manager.performance();
        assert_eq!(perf.len(), 1);
        assert_eq!(perf[0].state, crate::domain::entities::PerformanceState::Loaded);
    }

    #[tokio::test]
    async fn test_far_element_stays_idle() {
        let host = MockHost::new();
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut manager = manager(&host, fetcher.clone());

        host.place(id(1), FAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        let report = manager.check_visibility();

        assert!(report.visible.is_empty());
        assert_eq!(manager.state_of(id(1)), Some(LoadState::Idle));
        assert_eq!(host.last_render(id(1)), Some(RenderKind::Loading));
        assert_eq!(manager.in_flight(), 0);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let host = MockHost::new();
        let mut fetcher = MockImageFetchPort::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(ImageSize::new(32, 16)));
        let mut manager = manager_with(&host, Arc::new(fetcher), LazyOptions::default());

        host.place(id(1), NEAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        manager.settle().await;

        host.place(id(2), NEAR);
        manager.register(id(2), SourceSpec::new("a.jpg")).unwrap();
        assert_eq!(manager.load(id(2)).unwrap(), LoadOutcome::CacheHit);
        assert_eq!(manager.state_of(id(2)), Some(LoadState::Loaded));
        assert_eq!(
            manager.get(id(2)).and_then(|el| el.natural),
            Some(ImageSize::new(32, 16))
        );
        assert_eq!(manager.load(id(2)).unwrap(), LoadOutcome::AlreadyLoaded);
        assert_eq!(manager.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_attempts_are_capped() {
        let host = MockHost::new();
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.script("bad.jpg", Err(FetchError::HttpStatus(404)));
        let mut manager = manager(&host, fetcher.clone());

        host.place(id(1), NEAR);
        manager.register(id(1), SourceSpec::new("bad.jpg")).unwrap();
        manager.settle().await;
        assert_eq!(manager.state_of(id(1)), Some(LoadState::Errored));
        assert_eq!(host.last_render(id(1)), Some(RenderKind::Error));

        for _ in 0..2 {
            assert_eq!(manager.load(id(1)).unwrap(), LoadOutcome::Started);
            manager.settle().await;
        }

        assert_eq!(manager.load(id(1)).unwrap(), LoadOutcome::Exhausted);
        assert_eq!(manager.get(id(1)).map(|el| el.attempt), Some(3));
        assert_eq!(fetcher.calls(), 3);
        assert!(!manager.is_cached("bad.jpg"));
    }

    #[tokio::test]
    async fn test_exhaustion_reported_once_per_source() {
        let host = MockHost::new();
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.script("bad.jpg", Err(FetchError::HttpStatus(404)));
        let options = LazyOptions {
            attempt: 1,
            silent: false,
            ..LazyOptions::default()
        };
        let mut manager = manager_with(&host, fetcher.clone(), options);

        host.place(id(1), NEAR);
        manager.register(id(1), SourceSpec::new("bad.jpg")).unwrap();
        manager.settle().await;
        assert!(!manager.get(id(1)).unwrap().exhaustion_reported);

        assert_eq!(manager.load(id(1)).unwrap(), LoadOutcome::Exhausted);
        assert!(manager.get(id(1)).unwrap().exhaustion_reported);
        assert_eq!(manager.load(id(1)).unwrap(), LoadOutcome::Exhausted);
        assert!(manager.get(id(1)).unwrap().exhaustion_reported);

        manager.update(id(1), SourceSpec::new("good.jpg")).unwrap();
        manager.load(id(1)).unwrap();
        manager.settle().await;
        let tracked = manager.get(id(1)).unwrap();
        assert!(!tracked.exhaustion_reported);
        assert_eq!(tracked.state, LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_drain_completions_applies_landed_fetches() {
        let host = MockHost::new();
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut manager = manager(&host, fetcher);

        assert_eq!(manager.drain_completions(), 0);
        host.place(id(1), NEAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        assert_eq!(manager.in_flight(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(manager.drain_completions(), 1);
        assert_eq!(manager.in_flight(), 0);
        assert_eq!(manager.state_of(id(1)), Some(LoadState::Loaded));
        assert_eq!(manager.drain_completions(), 0);
    }

    #[tokio::test]
    async fn test_event_capacity_holds_large_page() {
        const COUNT: u64 = 200;
        let host = MockHost::new();
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut manager = manager(&host, fetcher).with_event_capacity(COUNT as usize * 3);
        let mut events = manager.subscribe();

        for n in 1..=COUNT {
            host.place(id(n), NEAR);
            manager.register(id(n), SourceSpec::new(format!("{n}.jpg"))).unwrap();
            manager.load(id(n)).unwrap();
        }
        manager.settle().await;

        let mut received = 0;
        loop {
            match events.try_recv() {
                Ok(_) => received += 1,
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(e) => panic!("events lost: {e:?}"),
            }
        }
        assert_eq!(received, COUNT as usize * 3);
    }

    #[tokio::test]
    async fn test_load_in_flight_is_noop() {
        let host = MockHost::new();
        let fetcher = Arc::new(ScriptedFetcher::gated());
        let mut manager = manager(&host, fetcher.clone());

        host.place(id(1), NEAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        assert_eq!(manager.load(id(1)).unwrap(), LoadOutcome::InFlight);
        assert_eq!(manager.in_flight(), 1);

        fetcher.release(1);
        manager.settle().await;
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(manager.state_of(id(1)), Some(LoadState::Loaded));
    }

    #[tokio::test]
    async fn test_update_resets_and_discards_stale_fetch() {
        let host = MockHost::new();
        let fetcher = Arc::new(ScriptedFetcher::gated());
        let mut manager = manager(&host, fetcher.clone());

        host.place(id(1), NEAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        assert_eq!(manager.state_of(id(1)), Some(LoadState::Loading));

        manager.update(id(1), SourceSpec::new("b.jpg")).unwrap();
        let el = manager.get(id(1)).unwrap();
        assert_eq!(el.src, "b.jpg");
        assert_eq!(el.attempt, 0);
        assert_eq!(el.state, LoadState::Idle);

        fetcher.release(1);
        let completion = manager.next_completion().await.unwrap();
        assert_eq!(manager.apply_completion(completion), CompletionOutcome::Discarded);
        assert_eq!(manager.state_of(id(1)), Some(LoadState::Idle));
        assert!(!manager.is_cached("a.jpg"));

        assert_eq!(manager.load(id(1)).unwrap(), LoadOutcome::Started);
        fetcher.release(1);
        manager.settle().await;
        assert_eq!(manager.state_of(id(1)), Some(LoadState::Loaded));
        assert!(manager.is_cached("b.jpg"));
    }

    #[tokio::test]
    async fn test_same_source_update_keeps_state() {
        let host = MockHost::new();
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut manager = manager(&host, fetcher.clone());

        host.place(id(1), NEAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        manager.settle().await;

        manager
            .update(id(1), SourceSpec::new("a.jpg").with_loading("spin.gif"))
            .unwrap();
        let el = manager.get(id(1)).unwrap();
        assert_eq!(el.state, LoadState::Loaded);
        assert_eq!(el.loading, "spin.gif");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_unregister_discards_in_flight_fetch() {
        let host = MockHost::new();
        let fetcher = Arc::new(ScriptedFetcher::gated());
        let mut manager = manager(&host, fetcher.clone());

        host.place(id(1), NEAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        let renders = host.renders_for(id(1)).len();

        manager.unregister(id(1));
        assert!(!manager.is_tracked(id(1)));

        fetcher.release(1);
        let completion = manager.next_completion().await.unwrap();
        assert_eq!(manager.apply_completion(completion), CompletionOutcome::Discarded);
        assert_eq!(host.renders_for(id(1)).len(), renders);
        assert_eq!(manager.in_flight(), 0);
        assert!(manager.next_completion().await.is_none());
        assert!(!manager.is_cached("a.jpg"));
    }

    #[tokio::test]
    async fn test_unregister_unknown_is_noop() {
        let host = MockHost::new();
        let mut manager = manager(&host, Arc::new(ScriptedFetcher::new()));

        manager.unregister(id(42));
        assert!(manager.containers().is_empty());
        assert_eq!(host.listener_calls(), 0);
    }

    #[tokio::test]
    async fn test_container_counts_follow_registrations() {
        let host = MockHost::new();
        let mut manager = manager(&host, Arc::new(ScriptedFetcher::new()));
        let list = ContainerId::Element(id(9));

        host.place_in(id(1), FAR, list);
        host.place_in(id(2), FAR, list);
        host.place(id(3), FAR);
        for n in 1..=3 {
            manager.register(id(n), SourceSpec::new(format!("{n}.jpg"))).unwrap();
        }

        // Element 3 scrolls with the viewport, so the viewport is held twice for it.
        let containers = manager.containers();
        assert_eq!(containers.count(ContainerId::Viewport), 4);
        assert_eq!(containers.count(list), 2);
        assert_eq!(host.listener_count(ContainerId::Viewport), 1);
        assert_eq!(host.listener_count(list), 1);

        manager.unregister(id(1));
        assert_eq!(manager.containers().count(list), 1);
        assert_eq!(host.listener_count(list), 1);

        manager.unregister(id(2));
        assert_eq!(manager.containers().count(list), 0);
        assert_eq!(host.listener_count(list), 0);
        assert_eq!(manager.containers().count(ContainerId::Viewport), 2);

        manager.unregister(id(3));
        assert!(manager.containers().is_empty());
        assert_eq!(host.listened_containers(), 0);
    }

    #[tokio::test]
    async fn test_mode_switch_keeps_elements() {
        let host = MockHost::new().with_observer();
        let mut manager = manager(&host, Arc::new(ScriptedFetcher::new()));

        host.place(id(1), FAR);
        host.place(id(2), FAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        manager.register(id(2), SourceSpec::new("b.jpg")).unwrap();
        assert_eq!(manager.mode(), VisibilityMode::Event);

        manager.set_mode(VisibilityMode::Observer);
        assert_eq!(manager.mode(), VisibilityMode::Observer);
        assert_eq!(host.listened_containers(), 0);
        assert_eq!(host.observed().len(), 2);
        assert_eq!(manager.len(), 2);

        manager.set_mode(VisibilityMode::Event);
        manager.set_mode(VisibilityMode::Event);
        assert!(host.observed().is_empty());
        assert_eq!(host.listener_count(ContainerId::Viewport), 1);
        assert_eq!(host.observers_created(), 1);
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test]
    async fn test_observer_request_falls_back() {
        let host = MockHost::new();
        let options = LazyOptions {
            observer: true,
            ..LazyOptions::default()
        };
        let mut manager = manager_with(&host, Arc::new(ScriptedFetcher::new()), options);

        assert_eq!(manager.mode(), VisibilityMode::Event);
        host.place(id(1), FAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        assert_eq!(host.listener_count(ContainerId::Viewport), 1);
    }

    #[tokio::test]
    async fn test_intersections_drive_loads() {
        let host = MockHost::new().with_observer();
        let options = LazyOptions {
            observer: true,
            ..LazyOptions::default()
        };
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut manager = manager_with(&host, fetcher.clone(), options);

        host.place(id(1), FAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        assert!(host.observed().contains(&id(1)));
        assert_eq!(host.listened_containers(), 0);

        manager.handle_intersections(&[IntersectionEntry::new(id(1), false, 0.0)]);
        assert_eq!(manager.state_of(id(1)), Some(LoadState::Idle));

        manager.handle_intersections(&[IntersectionEntry::new(id(1), true, 0.5)]);
        manager.settle().await;

        assert_eq!(manager.state_of(id(1)), Some(LoadState::Loaded));
        assert!(!host.observed().contains(&id(1)));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_source_is_rejected() {
        let host = MockHost::new();
        let mut manager = manager(&host, Arc::new(ScriptedFetcher::new()));

        let err = manager.register(id(1), SourceSpec::new("  ")).unwrap_err();
        assert!(matches!(err, LazyError::MissingSource { .. }));
        assert!(!manager.is_tracked(id(1)));
        assert!(manager.containers().is_empty());
        assert!(host.renders_for(id(1)).is_empty());
    }

    #[tokio::test]
    async fn test_load_unknown_element() {
        let host = MockHost::new();
        let mut manager = manager(&host, Arc::new(ScriptedFetcher::new()));

        assert!(matches!(
            manager.load(id(7)),
            Err(LazyError::UnknownElement { .. })
        ));
    }

    #[tokio::test]
    async fn test_detached_element_is_dropped() {
        let host = MockHost::new();
        let mut manager = manager(&host, Arc::new(ScriptedFetcher::new()));

        host.place(id(1), FAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        host.detach(id(1));

        let report = manager.check_visibility();
        assert_eq!(report.removed, vec![id(1)]);
        assert!(!manager.is_tracked(id(1)));
        assert!(manager.containers().is_empty());
        assert_eq!(host.listened_containers(), 0);
    }

    #[tokio::test]
    async fn test_events_are_throttled() {
        let host = MockHost::new();
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut manager = manager(&host, fetcher.clone());

        host.place(id(1), FAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();

        host.place(id(1), NEAR);
        let now = Instant::now();
        assert!(!manager.notify_event(ContainerId::Viewport, "mousemove", now));
        assert!(manager.throttle_deadline().is_none());
        assert!(!manager.notify_event(ContainerId::Element(id(5)), "scroll", now));

        assert!(!manager.notify_event(ContainerId::Viewport, "scroll", now));
        let deadline = manager.throttle_deadline().unwrap();
        assert_eq!(manager.state_of(id(1)), Some(LoadState::Idle));

        assert!(!manager.poll_throttle(now));
        assert!(manager.poll_throttle(deadline));
        assert_eq!(manager.state_of(id(1)), Some(LoadState::Loading));

        manager.settle().await;
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_srcset_uses_scale() {
        let host = MockHost::new();
        let srcset = "s.jpg 320w, m.jpg 640w, l.jpg 1280w";

        let mut manager = manager(&host, Arc::new(ScriptedFetcher::new()));
        host.place(id(1), FAR);
        manager
            .register(id(1), SourceSpec::new("fallback.jpg").with_srcset(srcset))
            .unwrap();
        assert_eq!(manager.get(id(1)).unwrap().src, "m.jpg");

        let options = LazyOptions {
            scale: Some(2.0),
            ..LazyOptions::default()
        };
        let mut manager = manager_with(&host, Arc::new(ScriptedFetcher::new()), options);
        manager
            .register(id(1), SourceSpec::new("fallback.jpg").with_srcset(srcset))
            .unwrap();
        assert_eq!(manager.get(id(1)).unwrap().src, "l.jpg");
    }

    #[derive(Default)]
    struct CountingHooks {
        before: AtomicUsize,
        renders: AtomicUsize,
    }

    impl LoadHooks for CountingHooks {
        fn before_load(&self, _element: &TrackedElement, _options: &LazyOptions) {
            self.before.fetch_add(1, Ordering::SeqCst);
        }

        fn on_render(&self, _element: &TrackedElement, _kind: RenderKind, _options: &LazyOptions) {
            self.renders.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_hooks_and_filters() {
        let host = MockHost::new();
        let hooks = Arc::new(CountingHooks::default());
        let mut manager = manager(&host, Arc::new(ScriptedFetcher::new()))
            .with_hooks(hooks.clone())
            .with_filter(Arc::new(AppendQuery::new("v", "1")));

        host.place(id(1), NEAR);
        manager.register(id(1), SourceSpec::new("a.jpg")).unwrap();
        manager.settle().await;

        assert_eq!(manager.get(id(1)).unwrap().src, "a.jpg?v=1");
        assert_eq!(hooks.before.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.renders.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = LazyOptions {
            preload: 0.0,
            ..LazyOptions::default()
        };
        let result = LazyManager::new(
            options,
            Arc::new(MockHost::new()),
            Arc::new(ScriptedFetcher::new()),
        );
        assert!(matches!(
            result,
            Err(LazyError::InvalidOption { field: "preload", .. })
        ));
    }
}
