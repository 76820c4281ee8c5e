//! Reference-counted listener bookkeeping for scroll containers.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::entities::ContainerId;
use crate::domain::ports::HostPort;

#[derive(Debug, Clone, Copy)]
struct ContainerEntry {
    count: usize,
    listened: bool,
}

/// Tracks how many elements depend on each container and whether the
/// manager's listeners are attached to it.
///
/// Listeners are attached at most once per container and only while its
/// count is at least one.
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    entries: BTreeMap<ContainerId, ContainerEntry>,
}

impl ContainerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one dependent element. Attaches listeners on the first one when
    /// `listen` is set. Returns the new count.
    pub fn acquire(
        &mut self,
        container: ContainerId,
        listen: bool,
        host: &dyn HostPort,
        events: &[String],
    ) -> usize {
        let entry = self.entries.entry(container).or_insert(ContainerEntry {
            count: 0,
            listened: false,
        });
        entry.count += 1;

        if listen && !entry.listened {
            host.add_listeners(container, events);
            entry.listened = true;
            debug!(%container, "Attached listeners");
        }

        entry.count
    }

    /// Removes one dependent element. Detaches listeners and forgets the
    /// container when the count reaches zero. Returns the remaining count.
    pub fn release(
        &mut self,
        container: ContainerId,
        host: &dyn HostPort,
        events: &[String],
    ) -> usize {
        let Some(entry) = self.entries.get_mut(&container) else {
            return 0;
        };
        entry.count = entry.count.saturating_sub(1);
        if entry.count > 0 {
            return entry.count;
        }

        if entry.listened {
            host.remove_listeners(container, events);
            debug!(%container, "Detached listeners");
        }
        self.entries.remove(&container);
        0
    }

    /// Attaches listeners on every registered container that lacks them.
    pub fn listen_all(&mut self, host: &dyn HostPort, events: &[String]) {
        for (container, entry) in &mut self.entries {
            if !entry.listened {
                host.add_listeners(*container, events);
                entry.listened = true;
            }
        }
    }

    /// Detaches listeners from every container.
    pub fn unlisten_all(&mut self, host: &dyn HostPort, events: &[String]) {
        for (container, entry) in &mut self.entries {
            if entry.listened {
                host.remove_listeners(*container, events);
                entry.listened = false;
            }
        }
    }

    /// Dependent element count.
    #[must_use]
    pub fn count(&self, container: ContainerId) -> usize {
        self.entries.get(&container).map_or(0, |entry| entry.count)
    }

    /// Whether listeners are attached.
    #[must_use]
    pub fn is_listened(&self, container: ContainerId) -> bool {
        self.entries
            .get(&container)
            .is_some_and(|entry| entry.listened)
    }

    /// Registered containers.
    pub fn containers(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.entries.keys().copied()
    }

    /// Number of registered containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no container is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
