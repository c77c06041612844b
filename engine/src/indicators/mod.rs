// Technical studies computed over the candle window
pub mod sr_zones;

pub use sr_zones::PivotZoneDetector;

use serde_json::Value;
use shared::models::{Candle, SrZone};

// Common trait for zone detectors. Implementations are pure: the same window
// always yields the same zones.
pub trait ZoneDetector: Send + Sync {
    fn name(&self) -> &str;
    fn parameters(&self) -> Value; // Parameters used for this detector instance
    fn detect(&self, data: &[Candle]) -> Option<Vec<SrZone>>; // None when the window is too short to say anything
}
