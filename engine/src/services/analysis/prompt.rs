// Prompt text for the analysis model
use shared::models::{Candle, RiskMode};

pub const SYSTEM_INSTRUCTION: &str = r#"You are an institutional-grade market analysis terminal.
Strategy: order-flow analysis, smart-money concepts and detection of high-frequency algorithmic activity.

Analysis criteria:
1. Order flow: read the delta (aggressive buying versus selling), detect institutional absorption and volume imbalances.
2. Market structure: identify market structure breaks and changes of character.
3. Liquidity: locate buy-side and sell-side liquidity pools.
4. Whale detection: flag unusual volume spikes that suggest institutional participation.

Respond ONLY with a JSON object of this shape:
{
  "asset": "string",
  "session": "string",
  "flowContext": "string",
  "trend30m": "string",
  "liquidityTarget": "string",
  "pricePhase": "Expansion | Retracement | Accumulation | Distribution",
  "manipulationEvidence": "string",
  "decision": "CALL | PUT | NO_OPERATE",
  "entryZone": "string",
  "confidence": "string (e.g. 85%)",
  "alternativeScenario": "string",
  "riskLevel": "LOW | MEDIUM | HIGH",
  "sentiment": "BULLISH | BEARISH | NEUTRAL | PANIC | EUPHORIA",
  "macroContext": "string",
  "whaleActivity": "string",
  "volatilityIndex": 0.0,
  "probabilityScore": 0.0,
  "orderFlowMetrics": {
    "delta": 0,
    "imbalanceType": "BUY_SIDE | SELL_SIDE | NONE",
    "absorptionDetected": false,
    "orderStacking": "short description of order stacking"
  }
}
orderFlowMetrics.delta ranges from -100 (heavy selling) to 100 (heavy buying)."#;

/// One line per candle: `T: <time>, O: .., H: .., L: .., C: .., V: ..`.
pub fn format_candles(candles: &[Candle]) -> String {
    candles
        .iter()
        .map(|c| {
            format!(
                "T: {}, O: {:.5}, H: {:.5}, L: {:.5}, C: {:.5}, V: {:.0}",
                c.time, c.open, c.high, c.low, c.close, c.volume
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn candle_prompt(candles: &[Candle], asset: &str, mode: RiskMode) -> String {
    format!(
        "Analyze {} with an order-flow and smart-money focus. Risk mode: {}. Market data:\n\n{}",
        asset,
        mode.label(),
        format_candles(candles)
    )
}

pub fn image_prompt(asset: &str, mode: RiskMode) -> String {
    format!(
        "Vision scan of {}: read the order flow and structure in this chart capture. Look for aggressive versus passive \
         footprints at the current price levels and give a precise signal. Risk mode: {}.",
        asset,
        mode.label()
    )
}
