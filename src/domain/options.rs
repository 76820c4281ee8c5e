//! Tuning knobs for the lazy visibility manager.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::LazyError;

/// Transparent 1x1 GIF used when no placeholder is configured.
pub const DEFAULT_PLACEHOLDER: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// Host events that trigger a visibility re-check in event mode.
pub const DEFAULT_LISTEN_EVENTS: [&str; 7] = [
    "scroll",
    "wheel",
    "mousewheel",
    "resize",
    "animationend",
    "transitionend",
    "touchmove",
];

/// Default capacity of the loaded-URL cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 200;

/// Visibility detection strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityMode {
    /// Throttled bounding-box checks driven by host events.
    #[default]
    Event,
    /// Host-native intersection observation.
    Observer,
}

impl std::fmt::Display for VisibilityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Event => write!(f, "event"),
            Self::Observer => write!(f, "observer"),
        }
    }
}

/// Options passed to the host's intersection observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverOptions {
    /// Margin around the root, CSS syntax (`"0px"`).
    pub root_margin: String,
    /// Visible ratio that counts as a crossing.
    pub threshold: f64,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            root_margin: "0px".to_string(),
            threshold: 0.0,
        }
    }
}

/// Lazy loading configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyOptions {
    /// Viewport multiplier defining "near enough to preload".
    pub preload: f64,
    /// Minimum bottom edge for an element to count as visible.
    pub preload_top: f64,
    /// Throttle window for event-driven checks, in milliseconds.
    pub throttle_wait_ms: u64,
    /// Default loading placeholder.
    pub loading: String,
    /// Default error placeholder.
    pub error: String,
    /// Maximum fetch attempts per source.
    pub attempt: u32,
    /// Host events that trigger a check.
    pub listen_events: Vec<String>,
    /// Device pixel ratio for srcset selection; the host's value when unset.
    pub scale: Option<f64>,
    /// Prefer observer mode.
    pub observer: bool,
    /// Observer configuration.
    pub observer_options: ObserverOptions,
    /// Suppress user-facing warnings.
    pub silent: bool,
    /// Capacity of the loaded-URL cache.
    pub cache_capacity: usize,
}

impl Default for LazyOptions {
    fn default() -> Self {
        Self {
            preload: 1.3,
            preload_top: 0.0,
            throttle_wait_ms: 200,
            loading: DEFAULT_PLACEHOLDER.to_string(),
            error: DEFAULT_PLACEHOLDER.to_string(),
            attempt: 3,
            listen_events: DEFAULT_LISTEN_EVENTS.iter().map(ToString::to_string).collect(),
            scale: None,
            observer: false,
            observer_options: ObserverOptions::default(),
            silent: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl LazyOptions {
    /// Throttle window as a duration.
    #[must_use]
    pub const fn throttle_wait(&self) -> Duration {
        Duration::from_millis(self.throttle_wait_ms)
    }

    /// Mode requested by the configuration.
    #[must_use]
    pub const fn preferred_mode(&self) -> VisibilityMode {
        if self.observer {
            VisibilityMode::Observer
        } else {
            VisibilityMode::Event
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    /// Returns `LazyError::InvalidOption` naming the first bad field.
    pub fn validate(&self) -> Result<(), LazyError> {
        if !(self.preload.is_finite() && self.preload > 0.0) {
            return Err(LazyError::invalid_option("preload", "must be a positive number"));
        }
        if !self.preload_top.is_finite() {
            return Err(LazyError::invalid_option("preload_top", "must be finite"));
        }
        if self.throttle_wait_ms == 0 {
            return Err(LazyError::invalid_option(
                "throttle_wait_ms",
                "must be greater than zero",
            ));
        }
        if self.attempt == 0 {
            return Err(LazyError::invalid_option("attempt", "must be at least 1"));
        }
        if self.cache_capacity == 0 {
            return Err(LazyError::invalid_option(
                "cache_capacity",
                "must be at least 1",
            ));
        }
        if let Some(scale) = self.scale
            && !(scale.is_finite() && scale > 0.0)
        {
            return Err(LazyError::invalid_option("scale", "must be a positive number"));
        }
        if !(0.0..=1.0).contains(&self.observer_options.threshold) {
            return Err(LazyError::invalid_option(
                "observer_options.threshold",
                "must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_library_defaults() {
        let options = LazyOptions::default();
        assert!((options.preload - 1.3).abs() < f64::EPSILON);
        assert_eq!(options.throttle_wait(), Duration::from_millis(200));
        assert_eq!(options.attempt, 3);
        assert_eq!(options.listen_events.len(), 7);
        assert!(options.silent);
        assert_eq!(options.preferred_mode(), VisibilityMode::Event);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let options = LazyOptions {
            attempt: 0,
            ..LazyOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(LazyError::InvalidOption { field: "attempt", .. })
        ));

        let options = LazyOptions {
            observer_options: ObserverOptions {
                threshold: 1.5,
                ..ObserverOptions::default()
            },
            ..LazyOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let options: LazyOptions = toml::from_str("preload = 2.0\nobserver = true\n")?;
        assert!((options.preload - 2.0).abs() < f64::EPSILON);
        assert_eq!(options.preferred_mode(), VisibilityMode::Observer);
        assert_eq!(options.attempt, 3);
        Ok(())
    }
}
