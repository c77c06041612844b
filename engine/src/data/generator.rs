// Synthetic candle generator: backfill, live tick mutation and rollover.
//
// Every random move is a multiple of the instrument's step size scaled by the
// timeframe's volatility multiplier, so a 30s BTC candle and a 1D EUR/USD
// candle both look plausible on their own axis.
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::models::{Candle, Instrument, Timeframe};
use shared::utils::time_label;

use super::market_data::CandleWindow;
use crate::models::PriceDirection;

/// Candles produced by a backfill (120 closed + 1 open).
pub const BACKFILL_LEN: usize = 121;

const BACKFILL_VOLATILITY_FACTOR: f64 = 3.0;
const TICK_VOLATILITY_FACTOR: f64 = 0.5;
const WICK_FACTOR: f64 = 0.3;
const BACKFILL_MAX_VOLUME: f64 = 12_000.0;
const ROLLOVER_MIN_VOLUME: f64 = 3_000.0;
const ROLLOVER_MAX_VOLUME: f64 = 9_000.0;

/// Source of uniform samples. Injected so tests can pin exact OHLC values.
pub trait RandomSource: Send {
    /// Sample in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_unit()
    }
}

impl RandomSource for StdRng {
    fn next_unit(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

pub fn entropy_source() -> Box<dyn RandomSource> {
    Box::new(StdRng::from_entropy())
}

pub fn seeded_source(seed: u64) -> Box<dyn RandomSource> {
    Box::new(StdRng::seed_from_u64(seed))
}

/// Result of one live tick on the open candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTick {
    pub price: f64,
    pub direction: PriceDirection,
}

#[derive(Debug, Clone)]
pub struct CandleGenerator {
    instrument: Instrument,
    timeframe: Timeframe,
}

impl CandleGenerator {
    pub fn new(instrument: Instrument, timeframe: Timeframe) -> Self {
        CandleGenerator { instrument, timeframe }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn timeframe(&self) -> &Timeframe {
        &self.timeframe
    }

    fn volatility(&self, factor: f64) -> f64 {
        self.instrument.step_size * self.timeframe.volatility_multiplier * factor
    }

    /// Builds `BACKFILL_LEN` chained candles ending at `now`, starting from the base price.
    pub fn backfill(&self, rng: &mut dyn RandomSource, now: DateTime<Utc>) -> CandleWindow {
        let volatility = self.volatility(BACKFILL_VOLATILITY_FACTOR);
        let period = Duration::milliseconds(self.timeframe.duration_millis as i64);
        let mut window = CandleWindow::new();
        let mut last_price = self.instrument.base_price;

        for i in (0..BACKFILL_LEN as i32).rev() {
            let timestamp = now - period * i;
            let open = last_price;
            let close = open + rng.uniform(-0.5, 0.5) * volatility;
            let high = open.max(close) + rng.uniform(0.0, WICK_FACTOR) * volatility;
            let low = open.min(close) - rng.uniform(0.0, WICK_FACTOR) * volatility;
            let volume = rng.uniform(0.0, BACKFILL_MAX_VOLUME);

            window.push(Candle {
                timestamp,
                time: time_label(timestamp),
                open,
                high,
                low,
                close,
                volume,
            });
            last_price = close;
        }

        tracing::debug!(
            instrument = %self.instrument.id,
            timeframe = %self.timeframe.id,
            candles = window.len(),
            last_close = last_price,
            "Backfilled candle window"
        );
        window
    }

    /// Moves the open candle's close and widens its range. Never touches `open`
    /// or any closed candle. Returns `None` on an empty window.
    pub fn tick(&self, window: &mut CandleWindow, rng: &mut dyn RandomSource) -> Option<PriceTick> {
        let volatility = self.volatility(TICK_VOLATILITY_FACTOR);
        let last = window.last_mut()?;
        let change = rng.uniform(-0.5, 0.5) * volatility;
        let new_close = last.close + change;
        let direction = if new_close > last.close {
            PriceDirection::Up
        } else {
            PriceDirection::Down
        };

        last.close = new_close;
        last.high = last.high.max(new_close);
        last.low = last.low.min(new_close);

        Some(PriceTick { price: new_close, direction })
    }

    /// Closes the open candle and opens a flat one at its close. Returns the
    /// candle that just closed.
    pub fn rollover(
        &self,
        window: &mut CandleWindow,
        rng: &mut dyn RandomSource,
        now: DateTime<Utc>,
    ) -> Option<Candle> {
        let closed = window.last()?.clone();
        let volume = rng.uniform(ROLLOVER_MIN_VOLUME, ROLLOVER_MAX_VOLUME);
        window.push(Candle::flat(now, time_label(now), closed.close, volume));

        tracing::debug!(
            instrument = %self.instrument.id,
            timeframe = %self.timeframe.id,
            closed_at = closed.close,
            window_len = window.len(),
            "Rolled over to a new candle"
        );
        Some(closed)
    }
}
