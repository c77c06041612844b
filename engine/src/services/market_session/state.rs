// Synchronous core of a market session: one heartbeat at a time over an owned window.
use chrono::{DateTime, Utc};
use shared::models::{AnalysisResult, Candle, Instrument, SrZone, Timeframe};

use crate::data::generator::{CandleGenerator, PriceTick, RandomSource};
use crate::data::market_data::CandleWindow;
use crate::indicators::{PivotZoneDetector, ZoneDetector};
use crate::models::{PriceDirection, Selection};

/// What one heartbeat did to the window.
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatOutcome {
    Ticked {
        tick: PriceTick,
        seconds_remaining: u64,
    },
    RolledOver {
        tick: PriceTick,
        closed: Candle,
        opened: Candle,
        zones: Vec<SrZone>,
        seconds_remaining: u64,
    },
    /// Empty window; nothing to tick.
    Idle,
}

pub struct SessionState {
    selection: Selection,
    generator: CandleGenerator,
    detector: PivotZoneDetector,
    window: CandleWindow,
    zones: Vec<SrZone>,
    seconds_remaining: u64,
    live_price: f64,
    direction: PriceDirection,
    latest_analysis: Option<AnalysisResult>,
    rng: Box<dyn RandomSource>,
}

impl SessionState {
    /// Hard reset: fresh backfill, zones and a full countdown for the pair.
    pub fn start(
        instrument: Instrument,
        timeframe: Timeframe,
        generation: u64,
        mut rng: Box<dyn RandomSource>,
        now: DateTime<Utc>,
    ) -> Self {
        let generator = CandleGenerator::new(instrument, timeframe);
        let window = generator.backfill(rng.as_mut(), now);
        if let Err(e) = window.verify() {
            tracing::error!(error = %e, "Backfill produced an inconsistent window");
        }
        Self::assemble(generator, generation, window, rng)
    }

    fn assemble(
        generator: CandleGenerator,
        generation: u64,
        window: CandleWindow,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let instrument = generator.instrument();
        let selection = Selection {
            instrument_id: instrument.id.clone(),
            timeframe_id: generator.timeframe().id.clone(),
            generation,
        };
        let detector = PivotZoneDetector::new(instrument.step_size);
        let live_price = window.last().map(|c| c.close).unwrap_or(instrument.base_price);

        let mut state = SessionState {
            selection,
            seconds_remaining: full_countdown(generator.timeframe()),
            generator,
            detector,
            window,
            zones: Vec::new(),
            live_price,
            direction: PriceDirection::Up,
            latest_analysis: None,
            rng,
        };
        state.recompute_zones();
        state
    }

    /// Ticks the open candle. When the countdown is about to expire, calls
    /// `before_rollover` with the pre-rollover state, then closes the candle,
    /// recomputes zones and resets the countdown.
    pub fn heartbeat<F>(&mut self, now: DateTime<Utc>, before_rollover: F) -> HeartbeatOutcome
    where
        F: FnOnce(&SessionState),
    {
        let Some(tick) = self.generator.tick(&mut self.window, self.rng.as_mut()) else {
            return HeartbeatOutcome::Idle;
        };
        self.live_price = tick.price;
        self.direction = tick.direction;

        if self.seconds_remaining > 1 {
            self.seconds_remaining -= 1;
            return HeartbeatOutcome::Ticked { tick, seconds_remaining: self.seconds_remaining };
        }

        before_rollover(self);

        let Some(closed) = self.generator.rollover(&mut self.window, self.rng.as_mut(), now) else {
            return HeartbeatOutcome::Idle;
        };
        self.recompute_zones();
        self.seconds_remaining = full_countdown(self.generator.timeframe());

        HeartbeatOutcome::RolledOver {
            tick,
            closed,
            opened: self.window.last().cloned().unwrap_or_else(|| Candle::flat(now, String::new(), tick.price, 0.0)),
            zones: self.zones.clone(),
            seconds_remaining: self.seconds_remaining,
        }
    }

    /// Replaces zones from the current window; keeps the previous set when the
    /// window is too short for the detector.
    fn recompute_zones(&mut self) {
        if let Some(zones) = self.detector.detect(self.window.make_contiguous()) {
            tracing::debug!(
                instrument = %self.selection.instrument_id,
                zones = zones.len(),
                detector = %self.detector.name(),
                "Recomputed support/resistance zones"
            );
            self.zones = zones;
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn instrument(&self) -> &Instrument {
        self.generator.instrument()
    }

    pub fn timeframe(&self) -> &Timeframe {
        self.generator.timeframe()
    }

    pub fn window(&self) -> &CandleWindow {
        &self.window
    }

    pub fn zones(&self) -> &[SrZone] {
        &self.zones
    }

    pub fn seconds_remaining(&self) -> u64 {
        self.seconds_remaining
    }

    pub fn live_price(&self) -> f64 {
        self.live_price
    }

    pub fn direction(&self) -> PriceDirection {
        self.direction
    }

    pub fn latest_analysis(&self) -> Option<&AnalysisResult> {
        self.latest_analysis.as_ref()
    }

    pub fn set_latest_analysis(&mut self, analysis: AnalysisResult) {
        self.latest_analysis = Some(analysis);
    }

    pub fn rng_mut(&mut self) -> &mut dyn RandomSource {
        self.rng.as_mut()
    }
}

#[cfg(test)]
impl SessionState {
    /// Session over a caller-supplied window, for exercising short-window paths.
    pub(crate) fn from_candles(
        instrument: Instrument,
        timeframe: Timeframe,
        generation: u64,
        candles: Vec<Candle>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let generator = CandleGenerator::new(instrument, timeframe);
        Self::assemble(generator, generation, CandleWindow::from_candles(candles), rng)
    }
}

fn full_countdown(timeframe: &Timeframe) -> u64 {
    timeframe.duration_secs().max(1)
}
