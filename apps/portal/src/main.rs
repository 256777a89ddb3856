use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use portal::config::Config;
use portal::gateway::ApiClient;
use portal::pipeline::PipelineController;
use portal::session::store::FileSessionStore;
use portal::session::AuthSession;

/// Thin console wiring: log in with env credentials, load the pipeline, and
/// print per-stage counts. Real presentation layers consume the library.
#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting portal client v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(FileSessionStore::open(&config.session_file));
    let session = Arc::new(AuthSession::new(config.api_base.clone(), store));

    if let (Ok(username), Ok(password)) = (
        std::env::var("PORTAL_USERNAME"),
        std::env::var("PORTAL_PASSWORD"),
    ) {
        session.login(&username, &password).await?;
    } else if !session.is_authenticated() {
        info!("no credentials in env and no stored session; proceeding unauthenticated");
    }

    let api = Arc::new(ApiClient::new(config.api_base.clone(), session.clone()));
    let controller = PipelineController::new(api, config.origin(), config.page_size);

    controller.load(None).await?;

    info!("{} applications loaded", controller.total_count());
    for (stage, count) in controller.stage_counts() {
        info!("{:>14}: {}", stage.label(), count);
    }

    Ok(())
}
