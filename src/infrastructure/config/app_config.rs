//! Application configuration.

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::options::LazyOptions;

use super::args::CliArgs;

pub(crate) const APP_NAME: &str = "lazyview";
pub(crate) const APP_QUALIFIER: &str = "com";
pub(crate) const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from `config.toml` and overridden by CLI
/// flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Lazy loading options.
    #[serde(default)]
    pub lazy: LazyOptions,

    /// Viewer options.
    #[serde(default)]
    pub viewer: ViewerConfig,
}

/// Viewer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Pixels scrolled per key press or headless step.
    #[serde(default = "default_scroll_step")]
    pub scroll_step: f64,

    /// Redraw interval in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Answer fetches from the page's `[[images]]` table instead of the network.
    #[serde(default = "default_true")]
    pub offline: bool,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Smallest natural width listed in the gallery.
    #[serde(default)]
    pub gallery_min_width: u32,

    /// Smallest natural height listed in the gallery.
    #[serde(default)]
    pub gallery_min_height: u32,
}

fn default_scroll_step() -> f64 {
    120.0
}

fn default_tick_ms() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scroll_step: default_scroll_step(),
            tick_ms: default_tick_ms(),
            offline: true,
            request_timeout_secs: default_request_timeout(),
            gallery_min_width: 0,
            gallery_min_height: 0,
        }
    }
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(mode) = args.mode {
            self.lazy.observer = mode == crate::domain::options::VisibilityMode::Observer;
        }
        if let Some(preload) = args.preload {
            self.lazy.preload = preload;
        }
        if let Some(throttle) = args.throttle_ms {
            self.lazy.throttle_wait_ms = throttle;
        }
        if let Some(attempt) = args.attempt {
            self.lazy.attempt = attempt;
        }
        if args.verbose_errors {
            self.lazy.silent = false;
        }
        if let Some(offline) = args.offline {
            self.viewer.offline = offline;
        }
        if let Some(step) = args.scroll_step {
            self.viewer.scroll_step = step;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("lazyview.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}
