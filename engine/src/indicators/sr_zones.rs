// Support/resistance zones from three-point pivots clustered by distance
use super::ZoneDetector;
use serde_json::Value;
use shared::models::{Candle, SrZone, ZoneKind};

/// Below this many candles the detector has nothing to say.
pub const MIN_WINDOW_LEN: usize = 20;
pub const MIN_ZONE_STRENGTH: u8 = 2;
pub const MAX_ZONE_STRENGTH: u8 = 5;
pub const MAX_ZONES: usize = 12;
/// Pivots closer than this many steps merge into one zone.
const MERGE_THRESHOLD_STEPS: f64 = 10.0;
/// Candles at each end never qualify as pivots.
const EDGE_EXCLUSION: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pivot {
    pub index: usize,
    pub price: f64,
    pub kind: PivotKind,
}

/// Local highs/lows against the immediate neighbours, in scan order. A candle
/// can produce both a high and a low pivot.
pub fn find_pivots(candles: &[Candle]) -> Vec<Pivot> {
    let mut pivots = Vec::new();
    if candles.len() <= EDGE_EXCLUSION * 2 {
        return pivots;
    }

    for i in EDGE_EXCLUSION..candles.len() - EDGE_EXCLUSION {
        let (prev, cur, next) = (&candles[i - 1], &candles[i], &candles[i + 1]);
        if cur.high > prev.high && cur.high > next.high {
            pivots.push(Pivot { index: i, price: cur.high, kind: PivotKind::High });
        }
        if cur.low < prev.low && cur.low < next.low {
            pivots.push(Pivot { index: i, price: cur.low, kind: PivotKind::Low });
        }
    }
    pivots
}

/// Merges pivots into zones, in creation order and unfiltered.
pub fn cluster_pivots(pivots: &[Pivot], threshold: f64) -> Vec<SrZone> {
    let mut zones: Vec<SrZone> = Vec::new();
    for pivot in pivots {
        match zones.iter_mut().find(|z| (z.price - pivot.price).abs() < threshold) {
            Some(zone) => {
                zone.strength = (zone.strength + 1).min(MAX_ZONE_STRENGTH);
                zone.price = (zone.price + pivot.price) / 2.0;
            }
            None => {
                let (kind, tag) = match pivot.kind {
                    PivotKind::High => (ZoneKind::Resistance, "r"),
                    PivotKind::Low => (ZoneKind::Support, "s"),
                };
                zones.push(SrZone {
                    id: format!("auto-{}-{}", pivot.index, tag),
                    price: pivot.price,
                    kind,
                    strength: 1,
                });
            }
        }
    }
    zones
}

pub struct PivotZoneDetector {
    name: String,
    step_size: f64,
}

impl PivotZoneDetector {
    pub fn new(step_size: f64) -> Self {
        Self {
            name: "PivotZones".to_string(),
            step_size,
        }
    }

    pub fn merge_threshold(&self) -> f64 {
        self.step_size * MERGE_THRESHOLD_STEPS
    }
}

impl ZoneDetector for PivotZoneDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "step_size": self.step_size,
            "merge_threshold": self.merge_threshold(),
            "min_strength": MIN_ZONE_STRENGTH,
            "max_zones": MAX_ZONES,
        })
    }

    fn detect(&self, data: &[Candle]) -> Option<Vec<SrZone>> {
        if data.len() < MIN_WINDOW_LEN {
            return None;
        }

        let pivots = find_pivots(data);
        let mut zones: Vec<SrZone> = cluster_pivots(&pivots, self.merge_threshold())
            .into_iter()
            .filter(|z| z.strength >= MIN_ZONE_STRENGTH)
            .collect();

        // Keep the most recently created ones.
        let excess = zones.len().saturating_sub(MAX_ZONES);
        zones.drain(..excess);
        Some(zones)
    }
}
