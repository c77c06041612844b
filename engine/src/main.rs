// Engine main entry point
use engine::config::settings::{EngineSettings, CONFIG_PATH_ENV};
use engine::models::EngineEvent;
use engine::services::analysis::{AnalysisClient, GeminiClient};
use engine::services::MarketSession;
use engine::AppContext;
use shared::utils::{format_price, price_precision};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{info, warn};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    info!("Starting Nexus market engine...");

    // First CLI argument wins over NEXUS_CONFIG.
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .map(PathBuf::from);
    let mut settings = EngineSettings::load(config_path.as_deref())?;

    let client: Option<Arc<dyn AnalysisClient>> = match GeminiClient::from_settings(&settings.analysis) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "Analysis client unavailable, auto-analysis disabled");
            settings.auto_analyze = false;
            None
        }
    };

    let context = AppContext::load(settings);
    let session = MarketSession::new(context, client)?;
    let mut events = session.subscribe();

    let snapshot = session.snapshot().await;
    let precision = price_precision(&snapshot.selection.instrument_id);
    info!(
        instrument = %snapshot.selection.instrument_id,
        timeframe = %snapshot.selection.timeframe_id,
        price = %format_price(snapshot.live_price, precision),
        zones = snapshot.zones.len(),
        auto_analyze = session.auto_analyze(),
        "Session ready"
    );
    session.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            item = events.next() => {
                match item {
                    Some(Ok(event)) => log_event(&event, precision),
                    Some(Err(e)) => warn!(error = %e, "Event stream lagged"),
                    None => break,
                }
            }
        }
    }

    session.stop();
    Ok(())
}

fn log_event(event: &EngineEvent, precision: usize) {
    match event {
        EngineEvent::PriceTick { price, direction, seconds_remaining } => {
            tracing::debug!(price = %format_price(*price, precision), ?direction, seconds_remaining, "Tick");
        }
        EngineEvent::CandleClosed { closed, zones, .. } => {
            info!(time = %closed.time, close = %format_price(closed.close, precision), zones = zones.len(), "Candle closed");
        }
        EngineEvent::VerdictRecorded { verdict, analysis } => {
            info!(
                kind = ?verdict.kind,
                confidence = %verdict.confidence,
                price = %format_price(verdict.price, precision),
                sentiment = ?analysis.sentiment,
                reason = %verdict.reason,
                "Verdict"
            );
        }
        EngineEvent::AnalysisFailed { message } => warn!(%message, "Analysis failed"),
        EngineEvent::Notice { message } => warn!(%message, "Notice"),
        other => tracing::debug!(event = ?other, "Engine event"),
    }
}
