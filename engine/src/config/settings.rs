// Engine settings, loaded from an optional JSON file and overridden by environment variables
use serde::Deserialize;
use shared::models::RiskMode;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

pub const CONFIG_PATH_ENV: &str = "NEXUS_CONFIG";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineSettings {
    pub default_instrument: String,
    pub default_timeframe: String,
    pub auto_analyze: bool,
    pub risk_mode: RiskMode,
    /// Where persisted preferences live. `None` resolves to the platform data dir.
    pub state_path: Option<PathBuf>,
    pub analysis: AnalysisSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisSettings {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key; `GEMINI_API_KEY` is tried as a fallback.
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Lets the model ground its answer with Google Search.
    pub google_search: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            default_instrument: "EURUSD".to_string(),
            default_timeframe: "5m".to_string(),
            auto_analyze: true,
            risk_mode: RiskMode::Aggressive,
            state_path: None,
            analysis: AnalysisSettings::default(),
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-pro".to_string(),
            api_key_env: "API_KEY".to_string(),
            temperature: 0.1,
            timeout_secs: 60,
            google_search: true,
        }
    }
}

impl AnalysisSettings {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl EngineSettings {
    /// Reads `path` (if given and present), then applies `NEXUS_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                let parsed: EngineSettings = serde_json::from_str(&raw).map_err(|e| {
                    EngineError::ConfigError(format!("Invalid settings file '{}': {}", p.display(), e))
                })?;
                tracing::info!(path = %p.display(), "Loaded engine settings from file");
                parsed
            }
            Some(p) => {
                tracing::warn!(path = %p.display(), "Settings file not found, using defaults");
                EngineSettings::default()
            }
            None => EngineSettings::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Environment overrides, read through `lookup` so tests need not touch the process env.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(instrument) = lookup("NEXUS_INSTRUMENT") {
            self.default_instrument = instrument;
        }
        if let Some(timeframe) = lookup("NEXUS_TIMEFRAME") {
            self.default_timeframe = timeframe;
        }
        if let Some(flag) = lookup("NEXUS_AUTO_ANALYZE") {
            self.auto_analyze = match flag.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(EngineError::ConfigError(format!(
                        "NEXUS_AUTO_ANALYZE must be a boolean, got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(mode) = lookup("NEXUS_RISK_MODE") {
            self.risk_mode = serde_json::from_value(serde_json::Value::String(mode.clone()))
                .map_err(|_| EngineError::ConfigError(format!("Unknown risk mode '{}'", mode)))?;
        }
        if let Some(path) = lookup("NEXUS_STATE_PATH") {
            self.state_path = Some(PathBuf::from(path));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.default_instrument, "EURUSD");
        assert_eq!(settings.default_timeframe, "5m");
        assert!(settings.auto_analyze);
        assert_eq!(settings.risk_mode, RiskMode::Aggressive);
        assert_eq!(settings.analysis.temperature, 0.1);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"default_instrument": "BTCUSD", "analysis": {{"model": "test-model"}}}}"#).unwrap();
        file.flush().unwrap();

        let mut settings: EngineSettings =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        settings.apply_overrides(env(&[])).unwrap();
        assert_eq!(settings.default_instrument, "BTCUSD");
        assert_eq!(settings.default_timeframe, "5m");
        assert_eq!(settings.analysis.model, "test-model");
        assert_eq!(settings.analysis.api_key_env, "API_KEY");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        file.flush().unwrap();

        let err = EngineSettings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, EngineError::ConfigError(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = EngineSettings::default();
        settings
            .apply_overrides(env(&[
                ("NEXUS_INSTRUMENT", "XAUUSD"),
                ("NEXUS_TIMEFRAME", "1m"),
                ("NEXUS_AUTO_ANALYZE", "off"),
                ("NEXUS_RISK_MODE", "Conservador"),
                ("NEXUS_STATE_PATH", "/tmp/nexus.json"),
            ]))
            .unwrap();
        assert_eq!(settings.default_instrument, "XAUUSD");
        assert_eq!(settings.default_timeframe, "1m");
        assert!(!settings.auto_analyze);
        assert_eq!(settings.risk_mode, RiskMode::Conservative);
        assert_eq!(settings.state_path, Some(PathBuf::from("/tmp/nexus.json")));
    }

    #[test]
    fn test_env_override_rejects_bad_bool() {
        let mut settings = EngineSettings::default();
        let err = settings.apply_overrides(env(&[("NEXUS_AUTO_ANALYZE", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("NEXUS_AUTO_ANALYZE"));
    }
}
