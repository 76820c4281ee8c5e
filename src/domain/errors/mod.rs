//! Domain error types.

mod lazy_error;

pub use lazy_error::LazyError;
