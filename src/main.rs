mod api;
mod config;
mod i18n;
mod integrations;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use api::AppState;
use config::AirlyConfig;
use integrations::airly::{self, fetcher::ReqwestFetcher, scheduler::SystemClock, sink::EntitySink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("MARGE_AIRLY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    let config = AirlyConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // Initialize tracing; the debug toggle only changes the default filter
    let default_filter = if config.debug {
        "info,marge_airly=debug"
    } else {
        "info,marge_airly=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    tracing::info!("Starting marge-airly v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(
        installation = config.installation_id,
        schema = ?config.schema,
        poll_secs = config.poll_interval.as_secs(),
        language = %config.language,
        api_base = %config.api_base,
        "Configuration"
    );

    let app_state = Arc::new(AppState::new());

    let fetcher = ReqwestFetcher::new(&config.api_key, &config.language, config.http_timeout)
        .context("building Airly HTTP client")?;
    let integration = Arc::new(airly::AirlyIntegration::new(
        airly::Station::from_config(&config),
        config.poll_interval,
        fetcher,
        EntitySink::new(app_state.clone()),
        SystemClock,
        i18n::Translator::new(&config.language),
    ));
    airly::start_airly_poller(integration, config.heartbeat);

    let app = api::router(app_state);

    // Bind to configured port
    let port: u16 = std::env::var("MARGE_HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8124);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
