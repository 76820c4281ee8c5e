mod hooks_port;
mod host_port;
mod image_fetch_port;
mod observer_port;

pub use hooks_port::{LoadHooks, SourceFilter};
pub use host_port::HostPort;
pub use image_fetch_port::{FetchError, FetchRequest, FetchResult, ImageFetchPort};
pub use observer_port::{IntersectionEntry, VisibilityObserverPort};
