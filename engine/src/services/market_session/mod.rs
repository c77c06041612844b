// Live market session: one-second heartbeat, candle rollover and gated
// analysis requests for the selected (instrument, timeframe) pair.
//
// All window mutation for a heartbeat happens under a single lock on
// `SessionState`. Analysis calls run on their own task and only take the
// lock again to publish their result, so a slow model never delays a tick.
pub mod helpers;
pub mod state;

use chrono::{DateTime, Utc};
use shared::models::{AnalysisResult, Candle, OptionKind, RiskMode, SrZone, TradeRecord};
use shared::utils::time_label;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::BroadcastStream;

use self::helpers::{candle_verdict, image_verdict, VerdictReference};
use self::state::{HeartbeatOutcome, SessionState};
use crate::context::AppContext;
use crate::data::generator::{entropy_source, RandomSource};
use crate::error::Result;
use crate::models::events::SkipReason;
use crate::models::{EngineEvent, PriceDirection, Selection};
use crate::services::analysis::{
    AnalysisClient, AnalysisError, AnalysisRequest, CaptureError, CapturedFrame, ANALYSIS_CANDLES,
};
use crate::services::trade_ledger::simulate_trade;

pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);
/// Below this many candles a candle analysis is not worth sending.
pub const MIN_ANALYSIS_CANDLES: usize = 10;
const EVENT_CAPACITY: usize = 256;

pub type RngFactory = Box<dyn Fn() -> Box<dyn RandomSource> + Send + Sync>;

/// Point-in-time copy of the session for display layers.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub selection: Selection,
    pub candles: Vec<Candle>,
    pub zones: Vec<SrZone>,
    pub seconds_remaining: u64,
    pub live_price: f64,
    pub direction: PriceDirection,
    pub latest_analysis: Option<AnalysisResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnalysisKind {
    Candles,
    Image,
}

/// Clears the in-flight flag when the analysis task ends, however it ends.
struct BusyGuard {
    shared: Arc<SessionShared>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.shared.busy.store(false, Ordering::SeqCst);
    }
}

struct AnalysisJob {
    client: Arc<dyn AnalysisClient>,
    request: AnalysisRequest,
    kind: AnalysisKind,
    selection: Selection,
    reference: VerdictReference,
    guard: BusyGuard,
}

struct SessionShared {
    context: AppContext,
    state: Mutex<SessionState>,
    client: Option<Arc<dyn AnalysisClient>>,
    busy: AtomicBool,
    auto_analyze: AtomicBool,
    risk_mode: RwLock<RiskMode>,
    events: broadcast::Sender<EngineEvent>,
    rng_factory: RngFactory,
}

pub struct MarketSession {
    shared: Arc<SessionShared>,
    heartbeat_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MarketSession {
    /// Backfills the configured default pair. The heartbeat does not run until
    /// `start` is called.
    pub fn new(context: AppContext, client: Option<Arc<dyn AnalysisClient>>) -> Result<Self> {
        Self::with_rng_factory(context, client, Box::new(entropy_source))
    }

    pub fn with_rng_factory(
        context: AppContext,
        client: Option<Arc<dyn AnalysisClient>>,
        rng_factory: RngFactory,
    ) -> Result<Self> {
        let settings = &context.settings;
        let instrument = context.catalog.instrument(&settings.default_instrument)?.clone();
        let timeframe = context.catalog.timeframe(&settings.default_timeframe)?.clone();
        let state = SessionState::start(instrument, timeframe, 0, rng_factory(), Utc::now());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        tracing::info!(
            instrument = %state.selection().instrument_id,
            timeframe = %state.selection().timeframe_id,
            analysis_enabled = client.is_some(),
            "Market session created"
        );

        let shared = Arc::new(SessionShared {
            auto_analyze: AtomicBool::new(settings.auto_analyze),
            risk_mode: RwLock::new(settings.risk_mode),
            context,
            state: Mutex::new(state),
            client,
            busy: AtomicBool::new(false),
            events,
            rng_factory,
        });
        Ok(MarketSession { shared, heartbeat_task: std::sync::Mutex::new(None) })
    }

    /// Spawns the heartbeat loop. The first beat lands one period from now.
    pub fn start(&self) {
        let mut slot = self.heartbeat_task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let shared = Arc::clone(&self.shared);
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                shared.heartbeat(Utc::now()).await;
            }
        }));
        tracing::debug!("Heartbeat loop started");
    }

    /// Stops the heartbeat loop; returns whether one was running.
    pub fn stop(&self) -> bool {
        let mut slot = self.heartbeat_task.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.take() {
            Some(task) => {
                task.abort();
                tracing::debug!("Heartbeat loop stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.heartbeat_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Runs one heartbeat immediately, outside the timer.
    pub async fn heartbeat(&self) {
        self.shared.heartbeat(Utc::now()).await;
    }

    /// Hard reset onto a new pair: the timer is cancelled, the window is
    /// regenerated, and results still in flight for the old pair will be dropped.
    pub async fn switch_selection(&self, instrument_id: &str, timeframe_id: &str) -> Result<()> {
        let instrument = self.shared.context.catalog.instrument(instrument_id)?.clone();
        let timeframe = self.shared.context.catalog.timeframe(timeframe_id)?.clone();
        let was_running = self.stop();

        let event = {
            let mut state = self.shared.state.lock().await;
            let generation = state.selection().generation + 1;
            *state = SessionState::start(instrument, timeframe, generation, (self.shared.rng_factory)(), Utc::now());
            tracing::info!(
                instrument = %instrument_id,
                timeframe = %timeframe_id,
                generation,
                "Switched selection"
            );
            backfilled_event(&state)
        };
        self.shared.publish(event);

        if was_running {
            self.start();
        }
        Ok(())
    }

    /// Manual candle analysis. Returns whether a request was issued.
    pub async fn request_analysis(&self) -> bool {
        let job = {
            let state = self.shared.state.lock().await;
            self.shared.begin_candle_analysis(&state)
        };
        match job {
            Some(job) => {
                self.shared.spawn_analysis(job);
                true
            }
            None => false,
        }
    }

    /// Image analysis of a captured frame. A capture failure becomes a single
    /// `Notice` and leaves the session untouched.
    pub async fn analyze_capture(&self, capture: std::result::Result<CapturedFrame, CaptureError>) -> bool {
        let frame = match capture {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Frame capture failed");
                self.shared.publish(EngineEvent::Notice { message: format!("Capture failed: {}", e) });
                return false;
            }
        };

        let job = {
            let state = self.shared.state.lock().await;
            self.shared.begin_image_analysis(&state, frame, Utc::now())
        };
        match job {
            Some(job) => {
                self.shared.spawn_analysis(job);
                true
            }
            None => false,
        }
    }

    /// Settles a simulated option at the live price and records it.
    pub async fn execute_trade(&self, kind: OptionKind, signal_id: Option<String>) -> Result<TradeRecord> {
        let trade = {
            let mut state = self.shared.state.lock().await;
            let instrument = state.instrument().clone();
            let entry = state.live_price();
            simulate_trade(&instrument, kind, entry, signal_id, state.rng_mut(), Utc::now())
        };
        self.shared.context.preferences.lock().await.record_trade(trade.clone())?;
        Ok(trade)
    }

    pub async fn clear_trades(&self) -> Result<()> {
        self.shared.context.preferences.lock().await.clear_trades()
    }

    pub fn set_auto_analyze(&self, enabled: bool) {
        self.shared.auto_analyze.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "Auto analysis toggled");
    }

    pub fn auto_analyze(&self) -> bool {
        self.shared.auto_analyze.load(Ordering::SeqCst)
    }

    pub fn set_risk_mode(&self, mode: RiskMode) {
        *self.shared.risk_mode.write().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub fn risk_mode(&self) -> RiskMode {
        self.shared.risk_mode()
    }

    pub fn is_analyzing(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst)
    }

    pub fn context(&self) -> &AppContext {
        &self.shared.context
    }

    /// Lagging subscribers skip events rather than slow the session down.
    pub fn subscribe(&self) -> BroadcastStream<EngineEvent> {
        BroadcastStream::new(self.shared.events.subscribe())
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.shared.state.lock().await;
        SessionSnapshot {
            selection: state.selection().clone(),
            candles: state.window().to_vec(),
            zones: state.zones().to_vec(),
            seconds_remaining: state.seconds_remaining(),
            live_price: state.live_price(),
            direction: state.direction(),
            latest_analysis: state.latest_analysis().cloned(),
        }
    }
}

impl Drop for MarketSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SessionShared {
    fn publish(&self, event: EngineEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn risk_mode(&self) -> RiskMode {
        *self.risk_mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn heartbeat(self: &Arc<Self>, now: DateTime<Utc>) {
        let mut pending = None;
        let outcome = {
            let mut state = self.state.lock().await;
            let auto = self.auto_analyze.load(Ordering::SeqCst);
            state.heartbeat(now, |pre| {
                if auto {
                    pending = self.begin_candle_analysis(pre);
                }
            })
        };

        if let Some(job) = pending {
            self.spawn_analysis(job);
        }

        match outcome {
            HeartbeatOutcome::Ticked { tick, seconds_remaining } => {
                self.publish(EngineEvent::PriceTick { price: tick.price, direction: tick.direction, seconds_remaining });
            }
            HeartbeatOutcome::RolledOver { tick, closed, opened, zones, seconds_remaining } => {
                tracing::debug!(close = closed.close, time = %closed.time, zones = zones.len(), "Candle closed");
                self.publish(EngineEvent::PriceTick { price: tick.price, direction: tick.direction, seconds_remaining });
                self.publish(EngineEvent::CandleClosed { closed, opened, zones });
            }
            HeartbeatOutcome::Idle => {}
        }
    }

    /// Checks the gates and takes the in-flight flag. Skips are published.
    fn acquire(self: &Arc<Self>, state: &SessionState, kind: AnalysisKind) -> Option<(Arc<dyn AnalysisClient>, BusyGuard)> {
        let skip = |reason: SkipReason| {
            tracing::debug!(?reason, "Analysis trigger skipped");
            self.publish(EngineEvent::AnalysisSkipped { reason });
        };

        let Some(client) = self.client.clone() else {
            skip(SkipReason::NoClient);
            return None;
        };
        if kind == AnalysisKind::Candles && state.window().len() < MIN_ANALYSIS_CANDLES {
            skip(SkipReason::NotEnoughCandles);
            return None;
        }
        if self.busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            skip(SkipReason::InFlight);
            return None;
        }
        Some((client, BusyGuard { shared: Arc::clone(self) }))
    }

    /// The verdict is pinned to the last candle of the snapshot being sent.
    fn begin_candle_analysis(self: &Arc<Self>, state: &SessionState) -> Option<AnalysisJob> {
        let (client, guard) = self.acquire(state, AnalysisKind::Candles)?;
        let candles = state.window().tail(ANALYSIS_CANDLES);
        let last = candles.last()?;
        let reference = VerdictReference { time: last.time.clone(), price: last.close };
        let request = AnalysisRequest::candles(&candles, &state.instrument().display_name, self.risk_mode());

        self.publish(EngineEvent::AnalysisStarted { selection: state.selection().clone() });
        Some(AnalysisJob {
            client,
            request,
            kind: AnalysisKind::Candles,
            selection: state.selection().clone(),
            reference,
            guard,
        })
    }

    fn begin_image_analysis(
        self: &Arc<Self>,
        state: &SessionState,
        frame: CapturedFrame,
        now: DateTime<Utc>,
    ) -> Option<AnalysisJob> {
        let (client, guard) = self.acquire(state, AnalysisKind::Image)?;
        let reference = VerdictReference { time: time_label(now), price: state.live_price() };
        let request = AnalysisRequest::image(frame, &state.instrument().display_name, self.risk_mode());

        self.publish(EngineEvent::AnalysisStarted { selection: state.selection().clone() });
        Some(AnalysisJob {
            client,
            request,
            kind: AnalysisKind::Image,
            selection: state.selection().clone(),
            reference,
            guard,
        })
    }

    fn spawn_analysis(self: &Arc<Self>, job: AnalysisJob) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let AnalysisJob { client, request, kind, selection, reference, guard } = job;
            let result = client.analyze(request).await;
            let event = shared.complete_analysis(result, kind, &selection, &reference).await;
            drop(guard);
            shared.publish(event);
        });
    }

    /// Applies a finished analysis if its selection is still current.
    async fn complete_analysis(
        &self,
        result: std::result::Result<AnalysisResult, AnalysisError>,
        kind: AnalysisKind,
        issued_for: &Selection,
        reference: &VerdictReference,
    ) -> EngineEvent {
        let analysis = match result {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(error = %e, instrument = %issued_for.instrument_id, "Analysis request failed");
                return EngineEvent::AnalysisFailed { message: e.to_string() };
            }
        };

        {
            let mut state = self.state.lock().await;
            if state.selection() != issued_for {
                tracing::info!(
                    issued_for = %issued_for.instrument_id,
                    current = %state.selection().instrument_id,
                    "Dropping analysis issued for a previous selection"
                );
                return EngineEvent::StaleAnalysisDropped { issued_for: issued_for.clone() };
            }
            state.set_latest_analysis(analysis.clone());
        }

        // The history write hits disk; heartbeats must not wait behind it.
        let verdict = match kind {
            AnalysisKind::Candles => candle_verdict(&issued_for.instrument_id, reference, &analysis),
            AnalysisKind::Image => image_verdict(&issued_for.instrument_id, reference, &analysis),
        };
        if let Err(e) = self.context.preferences.lock().await.record_verdict(verdict.clone()) {
            tracing::error!(error = %e, "Failed to persist verdict history");
        }
        tracing::info!(
            asset = %verdict.asset,
            kind = ?verdict.kind,
            price = verdict.price,
            confirmed = verdict.order_flow_confirmed,
            "Verdict recorded"
        );
        EngineEvent::VerdictRecorded { verdict, analysis: Box::new(analysis) }
    }
}

fn backfilled_event(state: &SessionState) -> EngineEvent {
    EngineEvent::Backfilled {
        selection: state.selection().clone(),
        candles: state.window().to_vec(),
        zones: state.zones().to_vec(),
        seconds_remaining: state.seconds_remaining(),
    }
}
