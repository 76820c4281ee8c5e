pub mod container_registry;
pub mod gallery;
pub mod lazy_manager;
pub mod source;
pub mod throttle;
pub mod visibility;

pub use container_registry::ContainerRegistry;
pub use gallery::{GalleryFilter, GalleryImage, GallerySummary, ImageKind};
pub use lazy_manager::{
    CheckReport, CompletionOutcome, FetchCompletion, LazyEvent, LazyManager, LoadOutcome,
};
pub use source::{AppendQuery, select_from_srcset};
pub use throttle::{Throttle, ThrottleDecision};
pub use visibility::VisibilityStrategy;
