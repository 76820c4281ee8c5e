use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use lazyview::application::LazyManager;
use lazyview::domain::ports::ImageFetchPort;
use lazyview::infrastructure::{
    AppConfig, CliArgs, FetcherConfig, HttpImageFetcher, PageFetcher, PageModel, SimulatedHost,
    StorageManager,
};
use lazyview::presentation::{PageSession, ViewerApp, run_headless};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry().with(filter).init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let storage = StorageManager::new()?;
    let mut config = storage
        .load_config(args.config.as_deref())
        .wrap_err("failed to load configuration")?;
    config.merge_with_args(args);
    Ok(config)
}

fn create_session(config: &AppConfig, args: &CliArgs) -> Result<PageSession> {
    let model = PageModel::load(&args.page)
        .wrap_err_with(|| format!("failed to load page {}", args.page.display()))?;
    let host = SimulatedHost::new(model.clone());

    let fetcher: Arc<dyn ImageFetchPort> = if config.viewer.offline {
        Arc::new(PageFetcher::new(&model))
    } else {
        Arc::new(HttpImageFetcher::new(FetcherConfig {
            timeout_secs: config.viewer.request_timeout_secs,
            ..FetcherConfig::default()
        })?)
    };

    let manager = LazyManager::new(config.lazy.clone(), Arc::new(host.clone()), fetcher)?;
    info!(
        page = %args.page.display(),
        elements = model.elements.len(),
        offline = config.viewer.offline,
        "Page loaded"
    );
    Ok(PageSession::new(manager, host))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(version = lazyview::VERSION, "Starting {}", lazyview::NAME);

    let mut session = create_session(&config, &args)?;

    if args.headless {
        let report = run_headless(&mut session, args.steps, &config.viewer).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let app = ViewerApp::new(session, &config.viewer);
    let mut terminal = ratatui::init();

    let result = app.run(&mut terminal).await;

    ratatui::restore();

    result
}
