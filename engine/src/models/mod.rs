// Engine-side models: selection identity, tick direction and published events.
// Plain domain records (candles, zones, verdicts) live in `shared::models`.
pub mod events;

pub use events::EngineEvent;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Up,
    Down,
}

/// The (instrument, timeframe) pair a session is running. `generation` bumps on
/// every switch, so results issued under an older selection can be recognised
/// even if the user comes back to the same pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub instrument_id: String,
    pub timeframe_id: String,
    pub generation: u64,
}
