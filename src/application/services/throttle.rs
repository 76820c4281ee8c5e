//! Trailing-edge call coalescing.

use std::time::{Duration, Instant};

use tracing::trace;

/// What the caller should do with a throttled call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleDecision<A> {
    /// Outside the window: run now with these arguments.
    Run(A),
    /// Inside the window: the call is parked until `deadline`.
    Deferred {
        /// When the parked call becomes due.
        deadline: Instant,
    },
}

/// Runs at most once per window.
///
/// A call arriving inside the window is parked and becomes due when the
/// window elapses; later calls in the same window only replace the parked
/// arguments. The owner drives time explicitly through `call` and `poll`,
/// so any timer (tokio, a frame loop, a test clock) can sit on top.
#[derive(Debug)]
pub struct Throttle<A> {
    window: Duration,
    last_run: Option<Instant>,
    pending: Option<(Instant, A)>,
}

impl<A> Throttle<A> {
    /// Creates a throttle with the given window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_run: None,
            pending: None,
        }
    }

    /// Offers a call at `now`.
    pub fn call(&mut self, now: Instant, args: A) -> ThrottleDecision<A> {
        if let Some((deadline, parked)) = &mut self.pending {
            if now < *deadline {
                *parked = args;
                trace!("Throttle: replaced parked call");
                return ThrottleDecision::Deferred {
                    deadline: *deadline,
                };
            }
            self.pending = None;
        }

        match self.last_run {
            Some(last) if now.saturating_duration_since(last) < self.window => {
                let deadline = last + self.window;
                self.pending = Some((deadline, args));
                trace!(wait_ms = (deadline - now).as_millis(), "Throttle: call parked");
                ThrottleDecision::Deferred { deadline }
            }
            _ => {
                self.last_run = Some(now);
                ThrottleDecision::Run(args)
            }
        }
    }

    /// Releases the parked call if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<A> {
        match &self.pending {
            Some((deadline, _)) if now >= *deadline => {
                let (_, args) = self.pending.take()?;
                self.last_run = Some(now);
                Some(args)
            }
            _ => None,
        }
    }

    /// Deadline of the parked call, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    /// Returns true while a call is parked.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drops the parked call.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}
