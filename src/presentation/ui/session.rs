//! Manager and simulated page wired together.

use std::time::Instant;

use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::application::services::{FetchCompletion, LazyEvent, LazyManager, LoadOutcome};
use crate::domain::entities::{ContainerId, ElementId, Viewport};
use crate::domain::options::VisibilityMode;
use crate::domain::ports::HostPort;
use crate::infrastructure::page::{PageModel, SimulatedHost};
use crate::presentation::widgets::{ElementBox, LoadCounts};

/// Broadcast slots reserved per page element: the registration placeholder,
/// the fetch placeholder, the outcome and one retry.
const EVENTS_PER_ELEMENT: usize = 4;

/// Tally of lifecycle events seen on the broadcast channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    /// Loading placeholders shown.
    pub loading: usize,
    /// Images shown after a fetch.
    pub loaded: usize,
    /// Images shown straight from the load cache.
    pub cached: usize,
    /// Error placeholders shown.
    pub errors: usize,
}

impl EventCounts {
    fn record(&mut self, event: &LazyEvent) {
        match event {
            LazyEvent::Loading { .. } => self.loading += 1,
            LazyEvent::Loaded {
                from_cache: true, ..
            } => self.cached += 1,
            LazyEvent::Loaded { .. } => self.loaded += 1,
            LazyEvent::Error { .. } => self.errors += 1,
        }
    }
}

/// Registers every element of `model`. Elements the manager rejects are
/// logged and skipped. Returns how many were registered.
pub fn register_page(manager: &mut LazyManager, model: &PageModel) -> usize {
    let mut registered = 0;
    for spec in &model.elements {
        match manager.register(spec.element_id(), spec.source.clone()) {
            Ok(()) => registered += 1,
            Err(e) => warn!(element = spec.id, error = %e, "Element not registered"),
        }
    }
    info!(registered, total = model.elements.len(), "Page registered");
    registered
}

/// A page being viewed: the manager, its host and the scroll focus.
#[derive(Debug)]
pub struct PageSession {
    manager: LazyManager,
    host: SimulatedHost,
    targets: Vec<ContainerId>,
    focus: usize,
    events_rx: broadcast::Receiver<LazyEvent>,
    events: EventCounts,
}

impl PageSession {
    /// Subscribes to `manager` and registers the host's page with it.
    pub fn new(manager: LazyManager, host: SimulatedHost) -> Self {
        let model = host.model();
        let mut manager =
            manager.with_event_capacity(model.elements.len().saturating_mul(EVENTS_PER_ELEMENT));
        let events_rx = manager.subscribe();
        register_page(&mut manager, &model);

        let targets = std::iter::once(ContainerId::Viewport)
            .chain(
                model
                    .containers
                    .iter()
                    .map(|c| ContainerId::Element(ElementId::new(c.id))),
            )
            .collect();

        let mut session = Self {
            manager,
            host,
            targets,
            focus: 0,
            events_rx,
            events: EventCounts::default(),
        };
        session.sync_observer();
        session
    }

    /// The manager.
    #[must_use]
    pub const fn manager(&self) -> &LazyManager {
        &self.manager
    }

    /// The page.
    #[must_use]
    pub const fn host(&self) -> &SimulatedHost {
        &self.host
    }

    /// Container receiving scrolls.
    #[must_use]
    pub fn focus(&self) -> ContainerId {
        self.targets
            .get(self.focus)
            .copied()
            .unwrap_or(ContainerId::Viewport)
    }

    /// Events tallied so far.
    #[must_use]
    pub const fn events(&self) -> EventCounts {
        self.events
    }

    /// Moves focus to the next scroll container, wrapping around.
    pub fn next_focus(&mut self) -> ContainerId {
        self.focus = (self.focus + 1) % self.targets.len().max(1);
        self.focus()
    }

    /// Scrolls the focused container and reports the scroll. Returns false
    /// when the container was already at its limit.
    pub fn scroll(&mut self, dy: f64, now: Instant) -> bool {
        let container = self.focus();
        if !self.host.scroll_by(container, dy) {
            return false;
        }
        self.manager.notify_event(container, "scroll", now);
        self.sync_observer();
        true
    }

    /// Reports a viewport resize.
    pub fn resized(&mut self, now: Instant) {
        self.manager
            .notify_event(ContainerId::Viewport, "resize", now);
        self.sync_observer();
    }

    /// Feeds pending intersection changes to the manager.
    pub fn sync_observer(&mut self) {
        let entries = self.host.take_intersections();
        if !entries.is_empty() {
            self.manager.handle_intersections(&entries);
        }
    }

    /// Runs a parked throttled check if it is due.
    pub fn poll_throttle(&mut self, now: Instant) -> bool {
        self.manager.poll_throttle(now)
    }

    /// Sleeps until the parked check is due, then runs it.
    pub async fn flush_throttle(&mut self) {
        if let Some(deadline) = self.manager.throttle_deadline() {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            self.manager.poll_throttle(Instant::now());
            self.drain_events();
        }
    }

    /// Waits for the next fetch; `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<FetchCompletion> {
        self.manager.next_completion().await
    }

    /// Applies a finished fetch.
    pub fn apply_completion(&mut self, completion: FetchCompletion) {
        self.manager.apply_completion(completion);
    }

    /// Applies fetches that already landed.
    pub fn drain_completions(&mut self) -> usize {
        self.manager.drain_completions()
    }

    /// Waits for every fetch in flight, tallying events as they arrive.
    pub async fn settle(&mut self) {
        while let Some(completion) = self.manager.next_completion().await {
            self.manager.apply_completion(completion);
            self.drain_events();
        }
        self.drain_events();
    }

    /// Switches between event and observer detection.
    pub fn toggle_mode(&mut self) -> VisibilityMode {
        let next = match self.manager.mode() {
            VisibilityMode::Event => VisibilityMode::Observer,
            VisibilityMode::Observer => VisibilityMode::Event,
        };
        self.manager.set_mode(next);
        self.sync_observer();
        self.manager.mode()
    }

    /// Retries every errored element with attempts left. Returns how many
    /// fetches started.
    pub fn retry_errored(&mut self) -> usize {
        let errored: Vec<ElementId> = self
            .manager
            .elements()
            .filter(|el| el.state.is_errored())
            .map(|el| el.id)
            .collect();

        errored
            .into_iter()
            .filter(|id| matches!(self.manager.load(*id), Ok(LoadOutcome::Started)))
            .count()
    }

    /// Removes the first tracked element currently on screen from the page.
    /// The manager drops it on its next check.
    pub fn detach_visible(&mut self) -> Option<ElementId> {
        let bounds = self.host.viewport().bounds();
        let target = self.manager.elements().map(|el| el.id).find(|id| {
            self.host
                .element_rect(*id)
                .is_some_and(|rect| rect.intersection(&bounds).is_some())
        })?;
        self.host.detach(target);
        debug!(element = %target, "Detached from page");
        Some(target)
    }

    /// Consumes queued lifecycle events into the tally.
    pub fn drain_events(&mut self) -> usize {
        let mut drained = 0;
        loop {
            match self.events_rx.try_recv() {
                Ok(event) => {
                    self.events.record(&event);
                    drained += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event receiver lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        drained
    }

    /// Current viewport.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.host.viewport()
    }

    /// Tracked elements still on the page, positioned for drawing.
    #[must_use]
    pub fn element_boxes(&self) -> Vec<ElementBox> {
        self.manager
            .elements()
            .filter_map(|el| {
                Some(ElementBox {
                    id: el.id,
                    rect: self.host.element_rect(el.id)?,
                    state: el.state,
                })
            })
            .collect()
    }

    /// Elements per load state.
    #[must_use]
    pub fn counts(&self) -> LoadCounts {
        LoadCounts::tally(self.manager.elements().map(|el| el.state))
    }
}
