//! Allergen inference service: binary entrypoint.
//! Loads config and reference data, opens the feedback store, and serves
//! the HTTP boundary the wizard UI talks to.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use allergen_inference::{
    api::{create_router, AppState},
    config::AppConfig,
    engine::Engine,
    feedback::FeedbackStore,
    metrics::Metrics,
    reference::ReferenceData,
};

/// Compact logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("allergen_inference=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading configuration")?;

    // Reference data is mandatory: abort before serving anything.
    let reference = ReferenceData::load(&cfg.data.foods_path, &cfg.data.allergies_path)
        .context("loading reference data")?;

    let store = FeedbackStore::open(&cfg.feedback.feedback_path, &cfg.feedback.adjustments_path)
        .context("opening feedback store")?
        .with_recent_window(cfg.feedback.recent_window);

    let engine = Engine::with_strategy(Arc::new(reference), cfg.scoring.strategy, &cfg.classifier);
    info!(?engine, "engine ready");

    let metrics = Metrics::init(cfg.scoring.max_alternatives)?;
    let state = AppState::new(engine, store).with_max_alternatives(cfg.scoring.max_alternatives);
    let app = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    info!(addr = %cfg.server.bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
