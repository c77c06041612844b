use serde::Serialize;
use shared::models::{AnalysisResult, Candle, SrZone, Verdict};

use super::{PriceDirection, Selection};

/// Why an analysis trigger did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InFlight,
    NotEnoughCandles,
    NoClient,
}

/// Everything a display layer needs to follow the session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Backfilled {
        selection: Selection,
        candles: Vec<Candle>,
        zones: Vec<SrZone>,
        seconds_remaining: u64,
    },
    PriceTick {
        price: f64,
        direction: PriceDirection,
        seconds_remaining: u64,
    },
    CandleClosed {
        closed: Candle,
        opened: Candle,
        zones: Vec<SrZone>,
    },
    AnalysisStarted {
        selection: Selection,
    },
    AnalysisSkipped {
        reason: SkipReason,
    },
    VerdictRecorded {
        verdict: Verdict,
        analysis: Box<AnalysisResult>,
    },
    AnalysisFailed {
        message: String,
    },
    StaleAnalysisDropped {
        issued_for: Selection,
    },
    Notice {
        message: String,
    },
}
