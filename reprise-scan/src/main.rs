//! reprise-scan - audio reuse detection service
//!
//! Searches a video platform for a query, fingerprints a reference clip and
//! every discovered candidate, and reports which candidates reuse the
//! reference audio. Driven over HTTP REST + SSE.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reprise_common::config::{resolve_root_folder, ScratchDirs, TomlConfig};
use reprise_common::events::EventBus;
use reprise_scan::scan::{ScanOrchestrator, ScanRegistry, TempResourceManager};
use reprise_scan::sources::{
    AudioFetcher, HttpFetcher, RoutingFetcher, StagedFileFetcher, YouTubeSearchClient, YtDlpFetcher,
};
use reprise_scan::AppState;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5780;

/// Command-line arguments for reprise-scan
#[derive(Parser, Debug)]
#[command(name = "reprise-scan")]
#[command(about = "Audio reuse detection service")]
#[command(version)]
struct Args {
    /// Root folder for uploads and transient audio
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "REPRISE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "REPRISE_PORT")]
    port: Option<u16>,

    /// Discovery (YouTube Data API) key
    #[arg(long)]
    discovery_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = TomlConfig::load(args.config.as_deref()).context("Failed to load config")?;

    // Initialize tracing; RUST_LOG wins over the config file
    let fallback_filter = format!("reprise_scan={level},reprise_common={level},tower_http=info",
        level = toml_config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting reprise-scan (audio reuse detection)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Root folder and scratch directories
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    info!("Root folder: {}", root_folder.display());
    let scratch = ScratchDirs::ensure(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 2: Collaborators. A missing key is reported per scan request.
    let api_key = match reprise_scan::config::resolve_discovery_api_key(
        args.discovery_api_key.as_deref(),
        &toml_config,
    ) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!("{}; scans will be rejected until a key is configured", e);
            None
        }
    };
    let discovery = Arc::new(YouTubeSearchClient::new(api_key).context("Failed to build discovery client")?);

    let staged: Arc<dyn AudioFetcher> = Arc::new(StagedFileFetcher::new(scratch.uploads.clone()));
    let direct: Arc<dyn AudioFetcher> =
        Arc::new(HttpFetcher::new().context("Failed to build HTTP fetcher")?);
    let downloader: Arc<dyn AudioFetcher> = Arc::new(YtDlpFetcher::new(
        toml_config.fetcher.yt_dlp_path.clone(),
        toml_config.fetcher.cookies_file.clone(),
    ));
    let fetcher = Arc::new(RoutingFetcher::new(staged, direct, downloader));

    // Step 3: Scan pipeline
    let settings = &toml_config.scan;
    info!(
        threshold = settings.similarity_threshold,
        segment_secs = settings.segment_duration_secs,
        fetch_timeout_secs = settings.fetch_timeout_secs,
        max_concurrent = settings.max_concurrent_scans,
        "Scan settings"
    );

    let event_bus = EventBus::new(100);
    let resources = TempResourceManager::new(
        scratch.audio_temp.clone(),
        Duration::from_secs(settings.fetch_timeout_secs),
    );
    let orchestrator = ScanOrchestrator::new(discovery, fetcher, resources, settings, event_bus.clone());
    let registry = ScanRegistry::new(orchestrator, settings);

    let state = AppState::new(registry, event_bus, scratch);
    let app = reprise_scan::build_router(state);

    // Step 4: Serve
    let host = args
        .host
        .or_else(|| toml_config.host.clone())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    let addr = listener.local_addr()?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
