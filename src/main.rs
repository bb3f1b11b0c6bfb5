use anyhow::{Context, Result};
use clap::Parser;
use livecoach::advisory::{Advisor, OpenAiAdvisor};
use livecoach::notify::{bot, Notifier};
use livecoach::session::{SessionLimits, SessionRegistry};
use livecoach::transcript::{FirefliesSource, SupervisorConfig, TranscriptSource};
use livecoach::{create_router, AppState, Config};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "livecoach", about = "Live interview coaching relay")]
struct Args {
    /// Path to the config file (without extension)
    #[arg(long, default_value = "config/livecoach")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;
    info!("{} starting", cfg.service.name);

    let source: Arc<dyn TranscriptSource> =
        Arc::new(FirefliesSource::new(cfg.transcript.api_key.clone()));
    let advisor: Arc<dyn Advisor> = Arc::new(OpenAiAdvisor::new(
        cfg.advisory.api_key.clone(),
        cfg.advisory.model.clone(),
    ));
    let notifier = cfg
        .telegram
        .as_ref()
        .map(|t| Arc::new(Notifier::new(t.bot_token.clone(), t.chat_id.clone())));
    if notifier.is_none() {
        warn!("No Telegram token configured, notifications disabled");
    }

    let supervisor_config = SupervisorConfig {
        liveness_timeout: cfg.liveness_timeout(),
        poll_interval: cfg.poll_interval(),
    };
    let limits = SessionLimits {
        min_hint_interval: cfg.min_hint_interval(),
        ..SessionLimits::default()
    };

    let registry = Arc::new(SessionRegistry::new(
        source.clone(),
        advisor.clone(),
        notifier.clone(),
        supervisor_config,
        limits,
    ));

    if let Some(notifier) = notifier {
        tokio::spawn(bot::run(
            notifier,
            registry.clone(),
            source.clone(),
            advisor.clone(),
        ));
    }

    let state = AppState {
        registry: registry.clone(),
        source,
        advisor,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, closing sessions");
    registry.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}
