// Key/value local state (theme, signal history, trade ledger, custom levels, alert config).
//
// Values are stored as JSON under fixed keys in a single file. The file is read
// once at start and rewritten on every change.
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared::models::{AlertConfig, CustomLevel, Theme, TradeRecord, Verdict};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

pub const THEME_KEY: &str = "nexus_theme";
pub const SIGNAL_HISTORY_KEY: &str = "nexus_signal_history";
pub const TRADE_HISTORY_KEY: &str = "nexus_trade_history";
pub const CUSTOM_LEVELS_KEY: &str = "nexus_custom_levels";
pub const ALERT_CONFIG_KEY: &str = "nexus_alert_config";

/// Newest-first histories keep at most this many entries.
pub const HISTORY_CAP: usize = 100;

#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    values: BTreeMap<String, Value>,
}

impl LocalStore {
    /// Platform data directory, e.g. `~/.local/share/nexus-terminal/state.json`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "nexus", "nexus-terminal").map(|dirs| dirs.data_dir().join("state.json"))
    }

    /// Opens the file at `path`. A missing file starts empty; an unreadable one
    /// is logged and also starts empty so a bad snapshot never blocks start-up.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, Value>>(&raw) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Corrupt local state file, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable local state file, starting empty");
                BTreeMap::new()
            }
        };
        LocalStore { path: Some(path), values }
    }

    /// Never touches disk.
    pub fn in_memory() -> Self {
        LocalStore { path: None, values: BTreeMap::new() }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// `None` when the key is absent or its value no longer decodes.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring undecodable stored value");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        self.values.insert(key.to_string(), serde_json::to_value(value)?);
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash mid-write leaves the previous snapshot intact.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.values)?)?;
        fs::rename(&tmp, path)
            .map_err(|e| EngineError::StorageError(format!("Failed to replace '{}': {}", path.display(), e)))?;
        Ok(())
    }
}

/// Persisted user state with load-at-start / save-on-change semantics.
#[derive(Debug)]
pub struct Preferences {
    store: LocalStore,
    theme: Theme,
    verdicts: Vec<Verdict>,
    trades: Vec<TradeRecord>,
    custom_levels: Vec<CustomLevel>,
    alert_config: AlertConfig,
}

impl Preferences {
    pub fn load(store: LocalStore) -> Self {
        let theme: Theme = store.get(THEME_KEY).unwrap_or_default();
        let verdicts: Vec<Verdict> = store.get(SIGNAL_HISTORY_KEY).unwrap_or_default();
        let trades: Vec<TradeRecord> = store.get(TRADE_HISTORY_KEY).unwrap_or_default();
        let custom_levels: Vec<CustomLevel> = store.get(CUSTOM_LEVELS_KEY).unwrap_or_default();
        let alert_config: AlertConfig = store.get(ALERT_CONFIG_KEY).unwrap_or_default();
        tracing::debug!(
            path = ?store.path(),
            verdicts = verdicts.len(),
            trades = trades.len(),
            "Loaded persisted preferences"
        );
        Preferences { store, theme, verdicts, trades, custom_levels, alert_config }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn verdicts(&self) -> &[Verdict] {
        &self.verdicts
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn custom_levels(&self) -> &[CustomLevel] {
        &self.custom_levels
    }

    pub fn alert_config(&self) -> &AlertConfig {
        &self.alert_config
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.theme = theme;
        self.store.set(THEME_KEY, &self.theme)
    }

    /// Prepends and trims to `HISTORY_CAP`.
    pub fn record_verdict(&mut self, verdict: Verdict) -> Result<()> {
        self.verdicts.insert(0, verdict);
        self.verdicts.truncate(HISTORY_CAP);
        self.store.set(SIGNAL_HISTORY_KEY, &self.verdicts)
    }

    pub fn record_trade(&mut self, trade: TradeRecord) -> Result<()> {
        self.trades.insert(0, trade);
        self.trades.truncate(HISTORY_CAP);
        self.store.set(TRADE_HISTORY_KEY, &self.trades)
    }

    pub fn clear_trades(&mut self) -> Result<()> {
        self.trades.clear();
        self.store.set(TRADE_HISTORY_KEY, &self.trades)
    }

    pub fn add_custom_level(&mut self, price: f64, label: impl Into<String>) -> Result<CustomLevel> {
        let level = CustomLevel {
            id: uuid::Uuid::new_v4().to_string(),
            price,
            label: label.into(),
            is_active: true,
        };
        self.custom_levels.push(level.clone());
        self.store.set(CUSTOM_LEVELS_KEY, &self.custom_levels)?;
        Ok(level)
    }

    /// Returns whether a level with `id` existed.
    pub fn remove_custom_level(&mut self, id: &str) -> Result<bool> {
        let before = self.custom_levels.len();
        self.custom_levels.retain(|l| l.id != id);
        if self.custom_levels.len() == before {
            return Ok(false);
        }
        self.store.set(CUSTOM_LEVELS_KEY, &self.custom_levels)?;
        Ok(true)
    }

    pub fn set_alert_config(&mut self, config: AlertConfig) -> Result<()> {
        self.alert_config = config;
        self.store.set(ALERT_CONFIG_KEY, &self.alert_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{OptionKind, TradeOutcome, VerdictKind};
    use tempfile::TempDir;

    fn sample_verdict(n: usize) -> Verdict {
        Verdict {
            id: format!("v{}", n),
            time: "10:00:00".to_string(),
            asset: "EURUSD".to_string(),
            kind: VerdictKind::Buy,
            reason: "test".to_string(),
            confidence: "80%".to_string(),
            price: 1.0 + n as f64,
            order_flow_confirmed: false,
        }
    }

    fn sample_trade(n: usize) -> TradeRecord {
        TradeRecord {
            id: format!("t{}", n),
            asset: "EURUSD".to_string(),
            kind: OptionKind::Put,
            entry_price: 1.0,
            exit_price: 0.99,
            timestamp: "10:00:00".to_string(),
            outcome: TradeOutcome::Won,
            profit: 88.0,
            signal_id: None,
        }
    }

    #[test]
    fn test_defaults_on_empty_store() {
        let prefs = Preferences::load(LocalStore::in_memory());
        assert_eq!(prefs.theme(), Theme::Dark);
        assert!(prefs.verdicts().is_empty());
        assert_eq!(prefs.alert_config(), &AlertConfig::default());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut prefs = Preferences::load(LocalStore::open(&path));
        prefs.set_theme(Theme::Light).unwrap();
        prefs.record_verdict(sample_verdict(1)).unwrap();
        prefs.record_trade(sample_trade(1)).unwrap();
        let level = prefs.add_custom_level(1.09, "weekly high").unwrap();
        prefs
            .set_alert_config(AlertConfig { sensitivity: 4, ..AlertConfig::default() })
            .unwrap();

        let reopened = Preferences::load(LocalStore::open(&path));
        assert_eq!(reopened.theme(), Theme::Light);
        assert_eq!(reopened.verdicts(), &[sample_verdict(1)]);
        assert_eq!(reopened.trades().len(), 1);
        assert_eq!(reopened.custom_levels(), &[level]);
        assert_eq!(reopened.alert_config().sensitivity, 4);

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[THEME_KEY], "light");
    }

    #[test]
    fn test_histories_newest_first_and_capped() {
        let mut prefs = Preferences::load(LocalStore::in_memory());
        for n in 0..130 {
            prefs.record_verdict(sample_verdict(n)).unwrap();
            prefs.record_trade(sample_trade(n)).unwrap();
        }
        assert_eq!(prefs.verdicts().len(), HISTORY_CAP);
        assert_eq!(prefs.trades().len(), HISTORY_CAP);
        assert_eq!(prefs.verdicts()[0].id, "v129");
        assert_eq!(prefs.verdicts()[99].id, "v30");

        prefs.clear_trades().unwrap();
        assert!(prefs.trades().is_empty());
    }

    #[test]
    fn test_remove_custom_level() {
        let mut prefs = Preferences::load(LocalStore::in_memory());
        let keep = prefs.add_custom_level(1.0, "a").unwrap();
        let removed = prefs.add_custom_level(2.0, "b").unwrap();
        assert!(prefs.remove_custom_level(&removed.id).unwrap());
        assert!(!prefs.remove_custom_level("missing").unwrap());
        assert_eq!(prefs.custom_levels(), &[keep]);
    }

    #[test]
    fn test_corrupt_file_and_values_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Preferences::load(LocalStore::open(&path)).verdicts().is_empty());

        fs::write(&path, r#"{"nexus_theme": "purple", "nexus_alert_config": {"sensitivity": 3}}"#).unwrap();
        let prefs = Preferences::load(LocalStore::open(&path));
        assert_eq!(prefs.theme(), Theme::Dark);
        assert_eq!(prefs.alert_config(), &AlertConfig::default());
    }

    #[test]
    fn test_remove_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut store = LocalStore::open(&path);
        store.set(THEME_KEY, &Theme::Light).unwrap();
        store.remove(THEME_KEY).unwrap();
        assert!(LocalStore::open(&path).get::<Theme>(THEME_KEY).is_none());
    }
}
