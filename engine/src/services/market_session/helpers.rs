// Verdict construction from analysis results
use shared::models::{AnalysisResult, Verdict, VerdictKind};
use uuid::Uuid;

/// |delta| above this confirms a candle-close verdict.
const CANDLE_FLOW_CONFIRMATION: f64 = 40.0;
/// Image scans need a stronger delta unless absorption was seen.
const IMAGE_FLOW_CONFIRMATION: f64 = 50.0;
const IMAGE_REASON_CHARS: usize = 100;

/// Time label and price a verdict is pinned to.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictReference {
    pub time: String,
    pub price: f64,
}

pub fn candle_verdict(asset_id: &str, reference: &VerdictReference, result: &AnalysisResult) -> Verdict {
    let reason = if result.manipulation_evidence.trim().is_empty() {
        first_sentence(&result.flow_context).to_string()
    } else {
        result.manipulation_evidence.clone()
    };
    Verdict {
        id: Uuid::new_v4().to_string(),
        time: reference.time.clone(),
        asset: asset_id.to_string(),
        kind: VerdictKind::from(result.decision),
        reason,
        confidence: result.confidence.clone(),
        price: reference.price,
        order_flow_confirmed: result.order_flow_metrics.delta.abs() > CANDLE_FLOW_CONFIRMATION,
    }
}

pub fn image_verdict(asset_id: &str, reference: &VerdictReference, result: &AnalysisResult) -> Verdict {
    let evidence: String = result.manipulation_evidence.chars().take(IMAGE_REASON_CHARS).collect();
    let detail = if evidence.trim().is_empty() { "Capture processed".to_string() } else { evidence };
    let flow = &result.order_flow_metrics;
    Verdict {
        id: Uuid::new_v4().to_string(),
        time: reference.time.clone(),
        asset: asset_id.to_string(),
        kind: VerdictKind::from(result.decision),
        reason: format!("Visual scan: {}", detail),
        confidence: result.confidence.clone(),
        price: reference.price,
        order_flow_confirmed: flow.absorption_detected || flow.delta.abs() > IMAGE_FLOW_CONFIRMATION,
    }
}

fn first_sentence(text: &str) -> &str {
    text.split('.').next().unwrap_or("").trim()
}
