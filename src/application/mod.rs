//! Application layer: the lazy manager and the services it is built from.

/// Manager, throttling, container bookkeeping and gallery helpers.
pub mod services;

pub use services::{LazyEvent, LazyManager, LoadOutcome};
