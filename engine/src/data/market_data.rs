// Bounded, time-ascending candle window. The last candle is the one still open.
use shared::models::Candle;
use std::collections::VecDeque;

use crate::error::{EngineError, Result};

/// Most candles kept in memory; older ones are evicted from the head.
pub const MAX_WINDOW_LEN: usize = 150;

#[derive(Debug, Clone)]
pub struct CandleWindow {
    candles: VecDeque<Candle>,
    capacity: usize,
}

impl CandleWindow {
    pub fn new() -> Self {
        Self::with_capacity(MAX_WINDOW_LEN)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        CandleWindow {
            candles: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn from_candles(candles: Vec<Candle>) -> Self {
        let mut window = Self::new();
        for candle in candles {
            window.push(candle);
        }
        window
    }

    /// Appends at the tail and drops from the head once over capacity.
    pub fn push(&mut self, candle: Candle) {
        self.candles.push_back(candle);
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn last_mut(&mut self) -> Option<&mut Candle> {
        self.candles.back_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    /// Contiguous view, needed by the zone detector.
    pub fn make_contiguous(&mut self) -> &[Candle] {
        self.candles.make_contiguous()
    }

    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().cloned().collect()
    }

    /// Copy of the most recent `n` candles, oldest first.
    pub fn tail(&self, n: usize) -> Vec<Candle> {
        let skip = self.candles.len().saturating_sub(n);
        self.candles.iter().skip(skip).cloned().collect()
    }

    /// Checks OHLC bounds on every candle and open/close chaining between neighbours.
    pub fn verify(&self) -> Result<()> {
        let mut previous: Option<&Candle> = None;
        for (index, candle) in self.candles.iter().enumerate() {
            if !candle.is_well_formed() {
                return Err(EngineError::InvariantViolation {
                    index,
                    detail: format!(
                        "OHLC out of bounds (o={}, h={}, l={}, c={}, v={})",
                        candle.open, candle.high, candle.low, candle.close, candle.volume
                    ),
                });
            }
            if let Some(prev) = previous {
                if candle.open != prev.close {
                    return Err(EngineError::InvariantViolation {
                        index,
                        detail: format!("open {} does not continue previous close {}", candle.open, prev.close),
                    });
                }
            }
            previous = Some(candle);
        }
        Ok(())
    }
}

impl Default for CandleWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_candle(open: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc::now(),
            time: "00:00:00".to_string(),
            open,
            high: open.max(close) + 0.5,
            low: open.min(close) - 0.5,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn test_push_evicts_from_head() {
        let mut window = CandleWindow::with_capacity(3);
        for i in 0..5 {
            window.push(create_candle(i as f64, i as f64 + 1.0));
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.iter().next().unwrap().open, 2.0);
        assert_eq!(window.last().unwrap().open, 4.0);
    }

    #[test]
    fn test_default_capacity_is_150() {
        let mut window = CandleWindow::new();
        for _ in 0..200 {
            window.push(create_candle(1.0, 1.0));
        }
        assert_eq!(window.len(), MAX_WINDOW_LEN);
    }

    #[test]
    fn test_tail() {
        let window = CandleWindow::from_candles((0..10).map(|i| create_candle(i as f64, i as f64 + 1.0)).collect());
        let tail = window.tail(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].open, 7.0);
        assert_eq!(window.tail(50).len(), 10);
    }

    #[test]
    fn test_verify_detects_broken_chain() {
        let mut window = CandleWindow::new();
        window.push(create_candle(1.0, 2.0));
        window.push(create_candle(2.0, 3.0));
        assert!(window.verify().is_ok());

        window.push(create_candle(5.0, 4.0));
        match window.verify() {
            Err(EngineError::InvariantViolation { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected invariant violation, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_detects_bad_bounds() {
        let mut candle = create_candle(1.0, 2.0);
        candle.high = 1.5;
        let window = CandleWindow::from_candles(vec![candle]);
        assert!(window.verify().is_err());
    }
}
