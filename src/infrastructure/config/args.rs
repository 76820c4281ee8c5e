use std::path::PathBuf;

use clap::Parser;

use super::app_config::LogLevel;
use crate::domain::options::VisibilityMode;

#[derive(Debug, Parser)]
#[command(
    name = "lazyview",
    version,
    about = "Lazy image loading over a simulated page, in the terminal",
    long_about = None
)]
pub struct CliArgs {
    /// Page description (TOML).
    #[arg(value_name = "PAGE")]
    pub page: PathBuf,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Visibility detection mode.
    #[arg(long, value_enum)]
    pub mode: Option<VisibilityMode>,

    /// Preload multiplier of the viewport.
    #[arg(long)]
    pub preload: Option<f64>,

    /// Throttle window for scroll checks, in milliseconds.
    #[arg(long)]
    pub throttle_ms: Option<u64>,

    /// Maximum fetch attempts per image.
    #[arg(long)]
    pub attempt: Option<u32>,

    /// Log missing sources and failed loads as warnings.
    #[arg(long)]
    pub verbose_errors: bool,

    /// Answer fetches from the page file instead of the network.
    #[arg(long)]
    pub offline: Option<bool>,

    /// Pixels per scroll step.
    #[arg(long)]
    pub scroll_step: Option<f64>,

    /// Run without a terminal UI and print a JSON report.
    #[arg(long)]
    pub headless: bool,

    /// Scroll steps to take in headless mode.
    #[arg(long, default_value_t = 10)]
    pub steps: usize,
}
