//! Lazy manager error types.

use thiserror::Error;

use crate::domain::entities::ElementId;

/// Errors reported synchronously to callers of the manager.
///
/// Fetch failures never show up here; they only change an element's state.
#[derive(Debug, Error)]
pub enum LazyError {
    /// Registration or update without a usable source URL.
    #[error("image source is required for element {element}")]
    MissingSource { element: ElementId },

    /// Operation on an element that is not tracked.
    #[error("element {element} is not tracked")]
    UnknownElement { element: ElementId },

    /// Configuration value out of range.
    #[error("invalid option `{field}`: {reason}")]
    InvalidOption { field: &'static str, reason: String },
}

impl LazyError {
    /// Creates missing source error.
    #[must_use]
    pub const fn missing_source(element: ElementId) -> Self {
        Self::MissingSource { element }
    }

    /// Creates unknown element error.
    #[must_use]
    pub const fn unknown(element: ElementId) -> Self {
        Self::UnknownElement { element }
    }

    /// Creates invalid option error.
    #[must_use]
    pub fn invalid_option(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            field,
            reason: reason.into(),
        }
    }

    /// Returns whether the error comes from bad configuration rather than usage.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidOption { .. } | Self::MissingSource { .. })
    }
}
