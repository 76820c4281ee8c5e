//! Scripted run without a terminal.

use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::application::services::{GalleryFilter, GallerySummary};
use crate::domain::entities::{ContainerId, PerformanceEntry};
use crate::domain::options::VisibilityMode;
use crate::infrastructure::config::ViewerConfig;
use crate::infrastructure::image::CacheStats;

use super::session::{EventCounts, PageSession};

/// What a headless run observed.
#[derive(Debug, Clone, Serialize)]
pub struct HeadlessReport {
    /// Detection mode at the end of the run.
    pub mode: VisibilityMode,
    /// Scroll steps taken.
    pub steps: usize,
    /// Final page scroll offset.
    pub scroll_offset: f64,
    /// Per-element load state and timing.
    pub performance: Vec<PerformanceEntry>,
    /// Load cache counters.
    pub cache: CacheStats,
    /// Loaded images.
    pub gallery: GallerySummary,
    /// Lifecycle events seen.
    pub events: EventCounts,
}

impl HeadlessReport {
    /// Snapshot of `session` after `steps` scroll steps. The gallery lists
    /// loaded images that pass `filter`.
    #[must_use]
    pub fn capture(session: &PageSession, steps: usize, filter: &GalleryFilter) -> Self {
        let manager = session.manager();
        Self {
            mode: manager.mode(),
            steps,
            scroll_offset: session.host().scroll_offset(ContainerId::Viewport),
            performance: manager.performance(),
            cache: manager.cache_stats(),
            gallery: GallerySummary::collect_filtered(manager.elements(), filter),
            events: session.events(),
        }
    }
}

/// Scrolls the page `steps` times by the configured scroll step, letting
/// every throttled check and fetch finish between steps. Stops early at the
/// end of the page.
pub async fn run_headless(
    session: &mut PageSession,
    steps: usize,
    config: &ViewerConfig,
) -> HeadlessReport {
    session.flush_throttle().await;
    session.settle().await;

    let mut taken = 0;
    while taken < steps {
        if !session.scroll(config.scroll_step, Instant::now()) {
            break;
        }
        taken += 1;
        session.flush_throttle().await;
        session.settle().await;
        session.drain_events();
    }

    session.drain_events();
    let report = HeadlessReport::capture(session, taken, &super::gallery_filter(config));
    info!(
        steps = taken,
        tracked = report.performance.len(),
        loaded = report.gallery.images.len(),
        "Headless run finished"
    );
    report
}
