//! Domain entity definitions.

mod element;
mod geometry;

pub use element::{
    BindTarget, ContainerId, ElementId, ImageSize, LoadState, LoadTimings, PerformanceEntry,
    PerformanceState, RenderKind, SourceSpec, TrackedElement,
};
pub use geometry::{Rect, Viewport};
