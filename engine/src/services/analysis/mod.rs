// Contract with the external analysis service, plus the HTTP implementation in `gemini`.
pub mod gemini;
pub mod prompt;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use shared::models::{AnalysisResult, Candle, RiskMode};
use thiserror::Error;

/// Candles sent with each request.
pub const ANALYSIS_CANDLES: usize = 50;
const DELTA_RANGE: std::ops::RangeInclusive<f64> = -100.0..=100.0;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No API key configured (checked {0} and GEMINI_API_KEY)")]
    MissingApiKey(String),

    #[error("HTTP transport error: {source}")]
    Http { source: reqwest::Error },

    #[error("Analysis service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Analysis service returned no content")]
    EmptyResponse,

    #[error("Malformed analysis payload: {source}")]
    Malformed {
        #[from]
        source: serde_json::Error,
    },

    #[error("Order-flow delta {0} outside [-100, 100]")]
    DeltaOutOfRange(f64),
}

/// Drops the request URL so endpoint query strings never reach logs or events.
impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::Http { source: err.without_url() }
    }
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Captured frame is not a base64 data URL")]
    NotADataUrl,

    #[error("Captured frame is not valid base64: {source}")]
    InvalidImage {
        #[from]
        source: base64::DecodeError,
    },
}

/// A single encoded camera/screen frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    pub mime_type: String,
    pub data_base64: String,
}

impl CapturedFrame {
    pub fn from_jpeg(bytes: &[u8]) -> Self {
        CapturedFrame {
            mime_type: "image/jpeg".to_string(),
            data_base64: BASE64.encode(bytes),
        }
    }

    /// Accepts `data:<mime>;base64,<payload>` as produced by canvas exports.
    pub fn from_data_url(url: &str) -> Result<Self, CaptureError> {
        let rest = url.strip_prefix("data:").ok_or(CaptureError::NotADataUrl)?;
        let (header, payload) = rest.split_once(',').ok_or(CaptureError::NotADataUrl)?;
        let mime_type = header.strip_suffix(";base64").ok_or(CaptureError::NotADataUrl)?;
        BASE64.decode(payload)?;
        Ok(CapturedFrame {
            mime_type: if mime_type.is_empty() { "image/jpeg".to_string() } else { mime_type.to_string() },
            data_base64: payload.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum AnalysisRequest {
    Candles {
        candles: Vec<Candle>,
        asset: String,
        mode: RiskMode,
    },
    Image {
        frame: CapturedFrame,
        asset: String,
        mode: RiskMode,
    },
}

impl AnalysisRequest {
    /// Keeps only the last `ANALYSIS_CANDLES` candles.
    pub fn candles(window: &[Candle], asset: impl Into<String>, mode: RiskMode) -> Self {
        let skip = window.len().saturating_sub(ANALYSIS_CANDLES);
        AnalysisRequest::Candles {
            candles: window[skip..].to_vec(),
            asset: asset.into(),
            mode,
        }
    }

    pub fn image(frame: CapturedFrame, asset: impl Into<String>, mode: RiskMode) -> Self {
        AnalysisRequest::Image { frame, asset: asset.into(), mode }
    }

    pub fn asset(&self) -> &str {
        match self {
            AnalysisRequest::Candles { asset, .. } | AnalysisRequest::Image { asset, .. } => asset,
        }
    }
}

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;
}

/// Decodes the model's JSON text. Tolerates a Markdown code fence around it.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let trimmed = strip_code_fence(text.trim());
    if trimmed.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    let result: AnalysisResult = serde_json::from_str(trimmed)?;
    let delta = result.order_flow_metrics.delta;
    if !DELTA_RANGE.contains(&delta) {
        return Err(AnalysisError::DeltaOutOfRange(delta));
    }
    Ok(result)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
