//! Visibility detection strategies.

use tracing::{debug, warn};

use crate::domain::entities::ElementId;
use crate::domain::options::{LazyOptions, VisibilityMode};
use crate::domain::ports::{HostPort, VisibilityObserverPort};

use super::container_registry::ContainerRegistry;

/// Active detection strategy of a manager.
pub enum VisibilityStrategy {
    /// Nothing installed; only seen while switching modes.
    Stopped,
    /// Container listeners feed throttled checks.
    Event,
    /// A host observer reports crossings.
    Observer {
        /// Host observer handle.
        observer: Box<dyn VisibilityObserverPort>,
    },
}

impl VisibilityStrategy {
    /// Installs `mode` over the current registrations and tracked elements.
    ///
    /// Observer mode degrades to event mode when the host has no observer.
    pub fn start<'a>(
        mode: VisibilityMode,
        host: &dyn HostPort,
        options: &LazyOptions,
        containers: &mut ContainerRegistry,
        tracked: impl Iterator<Item = &'a ElementId>,
    ) -> Self {
        if mode == VisibilityMode::Observer {
            if let Some(mut observer) = host.create_observer(&options.observer_options) {
                let mut observed = 0usize;
                for id in tracked {
                    observer.observe(*id);
                    observed += 1;
                }
                debug!(observed, "Observer mode started");
                return Self::Observer { observer };
            }
            if !options.silent {
                warn!("Intersection observer unavailable, falling back to event mode");
            }
        }

        containers.listen_all(host, &options.listen_events);
        debug!(containers = containers.len(), "Event mode started");
        Self::Event
    }

    /// Tears down everything this strategy installed.
    pub fn stop<'a>(
        self,
        host: &dyn HostPort,
        options: &LazyOptions,
        containers: &mut ContainerRegistry,
        tracked: impl Iterator<Item = &'a ElementId>,
    ) {
        match self {
            Self::Stopped => {}
            Self::Event => containers.unlisten_all(host, &options.listen_events),
            Self::Observer { mut observer } => {
                for id in tracked {
                    observer.unobserve(*id);
                }
                observer.disconnect();
            }
        }
    }

    /// Current mode, if running.
    #[must_use]
    pub const fn mode(&self) -> Option<VisibilityMode> {
        match self {
            Self::Stopped => None,
            Self::Event => Some(VisibilityMode::Event),
            Self::Observer { .. } => Some(VisibilityMode::Observer),
        }
    }

    /// Whether new containers should get listeners.
    #[must_use]
    pub const fn listens_for_events(&self) -> bool {
        matches!(self, Self::Event)
    }

    /// A new element was registered.
    pub fn notify_registration(&mut self, element: ElementId) {
        if let Self::Observer { observer } = self {
            observer.observe(element);
        }
    }

    /// An element's source changed; observers re-arm so the next crossing fires.
    pub fn notify_update(&mut self, element: ElementId) {
        if let Self::Observer { observer } = self {
            observer.unobserve(element);
            observer.observe(element);
        }
    }

    /// An element finished loading or was removed.
    pub fn notify_done(&mut self, element: ElementId) {
        if let Self::Observer { observer } = self {
            observer.unobserve(element);
        }
    }
}

impl std::fmt::Debug for VisibilityStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Event => write!(f, "Event"),
            Self::Observer { .. } => write!(f, "Observer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ContainerId;
    use crate::domain::ports::mocks::MockHost;

    #[test]
    fn test_observer_falls_back_without_support() {
        let host = MockHost::new();
        let options = LazyOptions::default();
        let mut containers = ContainerRegistry::new();
        containers.acquire(ContainerId::Viewport, false, &host, &options.listen_events);

        let strategy = VisibilityStrategy::start(
            VisibilityMode::Observer,
            &host,
            &options,
            &mut containers,
            [ElementId::new(1)].iter(),
        );

        assert_eq!(strategy.mode(), Some(VisibilityMode::Event));
        assert!(containers.is_listened(ContainerId::Viewport));
    }

    #[test]
    fn test_observer_start_and_stop() {
        let host = MockHost::new().with_observer();
        let options = LazyOptions::default();
        let mut containers = ContainerRegistry::new();
        let ids = [ElementId::new(1), ElementId::new(2)];

        let strategy = VisibilityStrategy::start(
            VisibilityMode::Observer,
            &host,
            &options,
            &mut containers,
            ids.iter(),
        );
        assert_eq!(strategy.mode(), Some(VisibilityMode::Observer));
        assert_eq!(host.observed().len(), 2);

        strategy.stop(&host, &options, &mut containers, ids.iter());
        assert!(host.observed().is_empty());
    }
}
