// Static instrument and timeframe tables
use shared::models::{Instrument, InstrumentCategory, Timeframe};

use crate::error::{EngineError, Result};

const INSTRUMENTS: &[(&str, &str, InstrumentCategory, f64, f64)] = &[
    ("EURUSD", "EUR/USD", InstrumentCategory::Forex, 1.08542, 0.00015),
    ("GBPUSD", "GBP/USD", InstrumentCategory::Forex, 1.26418, 0.00018),
    ("USDJPY", "USD/JPY", InstrumentCategory::Forex, 151.452, 0.025),
    ("AUDUSD", "AUD/USD", InstrumentCategory::Forex, 0.65412, 0.00012),
    ("EURGBP", "EUR/GBP", InstrumentCategory::Forex, 0.85412, 0.00010),
    ("BTCUSD", "BTC/USD", InstrumentCategory::Crypto, 67250.00, 45.00),
    ("ETHUSD", "ETH/USD", InstrumentCategory::Crypto, 3450.00, 2.50),
    ("SOLUSD", "SOL/USD", InstrumentCategory::Crypto, 145.00, 0.15),
    ("EURUSD_OTC", "EUR/USD OTC", InstrumentCategory::BinaryOtc, 1.08500, 0.00015),
    ("GBPUSD_OTC", "GBP/USD OTC", InstrumentCategory::BinaryOtc, 1.26400, 0.00018),
    ("AAPL", "Apple Inc.", InstrumentCategory::Stocks, 185.50, 0.25),
    ("TSLA", "Tesla Inc.", InstrumentCategory::Stocks, 175.20, 0.40),
    ("NVDA", "NVIDIA Corp.", InstrumentCategory::Stocks, 820.50, 1.50),
    ("XAUUSD", "Gold", InstrumentCategory::Metals, 2345.50, 0.85),
    ("XAGUSD", "Silver", InstrumentCategory::Metals, 28.50, 0.05),
];

const TIMEFRAMES: &[(&str, &str, f64, u64)] = &[
    ("30s", "30S", 0.1, 30_000),
    ("1m", "1M", 0.2, 60_000),
    ("5m", "5M", 1.0, 300_000),
    ("10m", "10M", 1.5, 600_000),
    ("30m", "30M", 3.0, 1_800_000),
    ("1h", "1H", 5.0, 3_600_000),
    ("4h", "4H", 10.0, 14_400_000),
    ("1d", "1D", 30.0, 86_400_000),
    ("1w", "1W", 120.0, 604_800_000),
    ("1mo", "1MO", 480.0, 2_592_000_000),
];

/// Everything the dashboard can select. Built once at start, never mutated.
#[derive(Debug, Clone)]
pub struct Catalog {
    instruments: Vec<Instrument>,
    timeframes: Vec<Timeframe>,
}

impl Catalog {
    pub fn new(instruments: Vec<Instrument>, timeframes: Vec<Timeframe>) -> Self {
        Catalog { instruments, timeframes }
    }

    pub fn builtin() -> Self {
        let instruments = INSTRUMENTS
            .iter()
            .map(|&(id, name, category, base_price, step_size)| Instrument {
                id: id.to_string(),
                display_name: name.to_string(),
                category,
                base_price,
                step_size,
            })
            .collect();
        let timeframes = TIMEFRAMES
            .iter()
            .map(|&(id, label, volatility_multiplier, duration_millis)| Timeframe {
                id: id.to_string(),
                label: label.to_string(),
                volatility_multiplier,
                duration_millis,
            })
            .collect();
        Catalog::new(instruments, timeframes)
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    pub fn instrument(&self, id: &str) -> Result<&Instrument> {
        self.instruments
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| EngineError::UnknownInstrument(id.to_string()))
    }

    pub fn timeframe(&self, id: &str) -> Result<&Timeframe> {
        self.timeframes
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| EngineError::UnknownTimeframe(id.to_string()))
    }

    /// Categories in first-seen order, for grouping pickers.
    pub fn categories(&self) -> Vec<InstrumentCategory> {
        let mut seen = Vec::new();
        for instrument in &self.instruments {
            if !seen.contains(&instrument.category) {
                seen.push(instrument.category);
            }
        }
        seen
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
