use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InstrumentCategory {
    Forex,
    Crypto,
    Metals,
    Stocks,
    Bonds,
    #[serde(rename = "Binary OTC")]
    BinaryOtc,
}

/// A tradable symbol. `step_size` is the unit every synthetic price move is
/// expressed in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub id: String,
    pub display_name: String,
    pub category: InstrumentCategory,
    pub base_price: f64,
    pub step_size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Timeframe {
    pub id: String,
    pub label: String,
    pub volatility_multiplier: f64,
    pub duration_millis: u64,
}

impl Timeframe {
    /// Full countdown for one candle of this timeframe.
    pub fn duration_secs(&self) -> u64 {
        self.duration_millis / 1000
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    /// Local wall-clock label (HH:MM:SS) shown on charts and sent for analysis.
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// A freshly opened candle: every price equals `price`.
    pub fn flat(timestamp: DateTime<Utc>, time: String, price: f64, volume: f64) -> Self {
        Candle {
            timestamp,
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.high >= self.low
            && self.volume >= 0.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Support,
    Resistance,
}

/// Support/resistance level inferred from clustered pivots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SrZone {
    pub id: String,
    pub price: f64,
    pub kind: ZoneKind,
    /// 1..=5, one point per reinforcing pivot.
    pub strength: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RiskMode {
    #[serde(alias = "Conservador")]
    Conservative,
    #[serde(alias = "Balanceado")]
    Balanced,
    #[default]
    #[serde(alias = "Agresivo")]
    Aggressive,
}

impl RiskMode {
    pub fn label(&self) -> &'static str {
        match self {
            RiskMode::Conservative => "Conservative",
            RiskMode::Balanced => "Balanced",
            RiskMode::Aggressive => "Aggressive",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Decision {
    #[serde(rename = "CALL")]
    Call,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "NO_OPERATE", alias = "NO OPERAR", alias = "NO_OPERAR")]
    NoOperate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
    Panic,
    Euphoria,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskLevel {
    #[serde(rename = "LOW", alias = "BAJO")]
    Low,
    #[serde(rename = "MEDIUM", alias = "MEDIO")]
    Medium,
    #[serde(rename = "HIGH", alias = "ALTO")]
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImbalanceType {
    #[serde(rename = "BUY_SIDE")]
    BuySide,
    #[serde(rename = "SELL_SIDE")]
    SellSide,
    #[serde(rename = "NONE")]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderFlowMetrics {
    /// Aggressive buy/sell balance, -100 (heavy selling) to 100 (heavy buying).
    pub delta: f64,
    pub imbalance_type: ImbalanceType,
    pub absorption_detected: bool,
    #[serde(rename = "orderStacking", alias = "orderStackingNote", default)]
    pub order_stacking_note: String,
}

/// Structured verdict returned by the analysis service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub flow_context: String,
    #[serde(default, rename = "trend30m")]
    pub trend_30m: String,
    #[serde(default)]
    pub liquidity_target: String,
    #[serde(default)]
    pub price_phase: String,
    #[serde(default)]
    pub manipulation_evidence: String,
    pub decision: Decision,
    #[serde(default)]
    pub entry_zone: String,
    pub confidence: String,
    #[serde(default)]
    pub alternative_scenario: String,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub mode: Option<RiskMode>,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub macro_context: String,
    #[serde(default)]
    pub whale_activity: String,
    #[serde(default)]
    pub volatility_index: f64,
    #[serde(default)]
    pub probability_score: f64,
    pub order_flow_metrics: OrderFlowMetrics,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictKind {
    Buy,
    Sell,
    Neutral,
}

impl From<Decision> for VerdictKind {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Call => VerdictKind::Buy,
            Decision::Put => VerdictKind::Sell,
            Decision::NoOperate => VerdictKind::Neutral,
        }
    }
}

/// One entry of the signal history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub id: String,
    pub time: String,
    pub asset: String,
    pub kind: VerdictKind,
    pub reason: String,
    pub confidence: String,
    pub price: f64,
    pub order_flow_confirmed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionKind {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeOutcome {
    Won,
    Lost,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: String,
    pub asset: String,
    pub kind: OptionKind,
    pub entry_price: f64,
    pub exit_price: f64,
    pub timestamp: String,
    #[serde(rename = "result")]
    pub outcome: TradeOutcome,
    pub profit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<String>,
}

/// User-drawn liquidity level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomLevel {
    pub id: String,
    pub price: f64,
    pub label: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertConfig {
    pub show_round_numbers: bool,
    pub show_sweeps: bool,
    pub show_order_blocks: bool,
    pub sensitivity: u8,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            show_round_numbers: true,
            show_sweeps: true,
            show_order_blocks: true,
            sensitivity: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result_json(decision: &str) -> String {
        format!(
            r#"{{
                "asset": "EUR/USD",
                "decision": "{decision}",
                "confidence": "85%",
                "riskLevel": "MEDIO",
                "sentiment": "BULLISH",
                "flowContext": "Buyers absorbing. More text.",
                "orderFlowMetrics": {{
                    "delta": 42,
                    "imbalanceType": "BUY_SIDE",
                    "absorptionDetected": true,
                    "orderStacking": "bids stacked below"
                }}
            }}"#
        )
    }

    #[test]
    fn test_analysis_result_accepts_both_no_trade_spellings() {
        let a: AnalysisResult = serde_json::from_str(&sample_result_json("NO OPERAR")).unwrap();
        let b: AnalysisResult = serde_json::from_str(&sample_result_json("NO_OPERATE")).unwrap();
        assert_eq!(a.decision, Decision::NoOperate);
        assert_eq!(b.decision, Decision::NoOperate);
        assert_eq!(a.risk_level, Some(RiskLevel::Medium));
        assert_eq!(a.order_flow_metrics.order_stacking_note, "bids stacked below");
        assert_eq!(a.order_flow_metrics.imbalance_type, ImbalanceType::BuySide);
    }

    #[test]
    fn test_analysis_result_requires_order_flow_metrics() {
        let json = r#"{"decision": "CALL", "confidence": "70%", "sentiment": "NEUTRAL"}"#;
        assert!(serde_json::from_str::<AnalysisResult>(json).is_err());
    }

    #[test]
    fn test_decision_maps_to_verdict_kind() {
        assert_eq!(VerdictKind::from(Decision::Call), VerdictKind::Buy);
        assert_eq!(VerdictKind::from(Decision::Put), VerdictKind::Sell);
        assert_eq!(VerdictKind::from(Decision::NoOperate), VerdictKind::Neutral);
    }

    #[test]
    fn test_candle_well_formed() {
        let ts = Utc::now();
        let flat = Candle::flat(ts, "10:00:00".to_string(), 1.2, 3000.0);
        assert!(flat.is_well_formed());

        let broken = Candle { high: 1.1, ..flat };
        assert!(!broken.is_well_formed());
    }

    #[test]
    fn test_trade_record_serializes_outcome_as_result() {
        let record = TradeRecord {
            id: "t1".to_string(),
            asset: "EURUSD".to_string(),
            kind: OptionKind::Call,
            entry_price: 1.0,
            exit_price: 1.001,
            timestamp: "10:00:00".to_string(),
            outcome: TradeOutcome::Won,
            profit: 88.0,
            signal_id: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["result"], "WON");
        assert!(value.get("signalId").is_none());
    }
}
