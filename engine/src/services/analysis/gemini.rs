// HTTP client for the hosted Gemini generateContent endpoint
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::models::AnalysisResult;
use std::time::Duration;

use super::prompt::{candle_prompt, image_prompt, SYSTEM_INSTRUCTION};
use super::{parse_analysis, AnalysisClient, AnalysisError, AnalysisRequest};
use crate::config::AnalysisSettings;

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    google_search: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

/// Search grounding takes no options.
#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl Part {
    fn text(text: String) -> Self {
        Part { text: Some(text), inline_data: None }
    }
}

impl GeminiClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(GeminiClient {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            temperature,
            google_search: true,
        })
    }

    /// Toggles the Google Search grounding tool (on by default).
    pub fn with_google_search(mut self, enabled: bool) -> Self {
        self.google_search = enabled;
        self
    }

    pub fn from_settings(settings: &AnalysisSettings) -> Result<Self, AnalysisError> {
        let api_key = settings
            .api_key()
            .ok_or_else(|| AnalysisError::MissingApiKey(settings.api_key_env.clone()))?;
        Self::new(
            &settings.endpoint,
            &settings.model,
            api_key,
            settings.temperature,
            Duration::from_secs(settings.timeout_secs),
        )
        .map(|client| client.with_google_search(settings.google_search))
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }

    fn build_body(&self, request: &AnalysisRequest) -> GenerateContentRequest {
        let parts = match request {
            AnalysisRequest::Candles { candles, asset, mode } => vec![Part::text(candle_prompt(candles, asset, *mode))],
            AnalysisRequest::Image { frame, asset, mode } => vec![
                Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: frame.mime_type.clone(),
                        data: frame.data_base64.clone(),
                    }),
                },
                Part::text(image_prompt(asset, *mode)),
            ],
        };

        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(SYSTEM_INSTRUCTION.to_string())],
            },
            contents: vec![Content { role: Some("user".to_string()), parts }],
            tools: if self.google_search {
                vec![Tool { google_search: GoogleSearch {} }]
            } else {
                Vec::new()
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: self.temperature,
            },
        }
    }

    /// The key travels in a header so it never shows up in a URL or in a
    /// transport error.
    fn build_request(&self, body: &GenerateContentRequest) -> reqwest::RequestBuilder {
        self.http.post(self.url()).header(API_KEY_HEADER, &self.api_key).json(body)
    }
}

/// Concatenated text of the first candidate.
fn response_text(raw: &str) -> Result<String, AnalysisError> {
    let response: GenerateContentResponse = serde_json::from_str(raw)?;
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .map(|c| c.content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl AnalysisClient for GeminiClient {
    async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let body = self.build_body(&request);
        tracing::debug!(asset = %request.asset(), model = %self.model, "Sending analysis request");

        let response = self.build_request(&body).send().await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(AnalysisError::Status { status: status.as_u16(), body: raw });
        }

        let result = parse_analysis(&response_text(&raw)?)?;
        tracing::debug!(asset = %request.asset(), decision = ?result.decision, "Analysis response parsed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analysis::CapturedFrame;
    use chrono::Utc;
    use shared::models::{Candle, RiskMode};

    fn create_client() -> GeminiClient {
        GeminiClient::new("https://example.test/", "test-model", "secret", 0.1, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        assert_eq!(create_client().url(), "https://example.test/v1beta/models/test-model:generateContent");
    }

    #[test]
    fn test_candle_body_shape() {
        let candles = vec![Candle::flat(Utc::now(), "10:00:00".to_string(), 1.1, 10.0)];
        let request = AnalysisRequest::candles(&candles, "EUR/USD", RiskMode::Aggressive);
        let body = serde_json::to_value(create_client().build_body(&request)).unwrap();

        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["contents"][0]["role"], "user");
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.contains("EUR/USD"));
        assert!(text.contains("T: 10:00:00, O: 1.10000"));
        assert!(body["systemInstruction"]["parts"][0]["text"].as_str().unwrap().contains("orderFlowMetrics"));
        assert!(body["systemInstruction"].get("role").is_none());
    }

    #[test]
    fn test_image_body_shape() {
        let frame = CapturedFrame::from_jpeg(b"jpeg-bytes");
        let request = AnalysisRequest::image(frame.clone(), "Gold", RiskMode::Balanced);
        let body = serde_json::to_value(create_client().build_body(&request)).unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], frame.data_base64.as_str());
        assert!(parts[0].get("text").is_none());
        assert!(parts[1]["text"].as_str().unwrap().contains("Gold"));
    }

    #[test]
    fn test_api_key_sent_as_header_not_query() {
        let candles = vec![Candle::flat(Utc::now(), "10:00:00".to_string(), 1.1, 10.0)];
        let client = create_client();
        let body = client.build_body(&AnalysisRequest::candles(&candles, "EUR/USD", RiskMode::Aggressive));
        let request = client.build_request(&body).build().unwrap();

        assert!(request.url().query().is_none());
        assert!(!request.url().as_str().contains("secret"));
        assert_eq!(request.headers()[API_KEY_HEADER], "secret");
    }

    #[test]
    fn test_google_search_tool_toggle() {
        let request = AnalysisRequest::candles(&[], "EUR/USD", RiskMode::Aggressive);

        let body = serde_json::to_value(create_client().build_body(&request)).unwrap();
        assert_eq!(body["tools"], serde_json::json!([{"googleSearch": {}}]));

        let plain = create_client().with_google_search(false);
        let body = serde_json::to_value(plain.build_body(&request)).unwrap();
        assert!(body.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_transport_error_never_exposes_api_key() {
        // Nothing listens on the discard port, so the send fails at connect time.
        let client =
            GeminiClient::new("http://127.0.0.1:9", "m", "SUPERSECRETKEY", 0.1, Duration::from_secs(2)).unwrap();
        let candles = vec![Candle::flat(Utc::now(), "10:00:00".to_string(), 1.1, 10.0)];

        let err = client
            .analyze(AnalysisRequest::candles(&candles, "EUR/USD", RiskMode::Aggressive))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Http { .. }));
        assert!(!err.to_string().contains("SUPERSECRETKEY"));
        assert!(!format!("{:?}", err).contains("SUPERSECRETKEY"));
    }

    #[test]
    fn test_response_text_joins_parts() {
        let raw = r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]}"#;
        assert_eq!(response_text(raw).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_response_text_errors() {
        assert!(matches!(response_text(r#"{"candidates": []}"#), Err(AnalysisError::EmptyResponse)));
        assert!(matches!(response_text("<html>"), Err(AnalysisError::Malformed { .. })));
    }

    #[test]
    fn test_from_settings_requires_key() {
        let settings = AnalysisSettings {
            api_key_env: "NEXUS_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..AnalysisSettings::default()
        };
        // GEMINI_API_KEY may be present on a developer machine; only assert when it is not.
        if std::env::var("GEMINI_API_KEY").is_err() {
            assert!(matches!(GeminiClient::from_settings(&settings), Err(AnalysisError::MissingApiKey(_))));
        }
    }
}
