//! Configuration management
//!
//! Settings live in settings.json in the reconkit directory:
//! ```json
//! {
//!   "defaults": { "dateOrder": "dmy", "numberFormat": "standard", "delimiter": ",", ... },
//!   "profiles": { "monthly-bank": { "sideA": { ... }, "sideB": { ... }, ... } }
//! }
//! ```
//! Keys this crate does not manage are preserved when saving.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::ConfigError;
use crate::domain::SideSchema;
use crate::services::engine::ToleranceConfig;
use crate::services::load::LoadOptions;
use crate::services::normalize::{AmountOptions, DateOrder, NumberFormat, DEFAULT_CURRENCY_SYMBOLS};

const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    defaults: Defaults,
    #[serde(default)]
    profiles: HashMap<String, ReconProfile>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Defaults applied when a run does not say otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    #[serde(default)]
    pub date_order: DateOrder,
    #[serde(default)]
    pub number_format: NumberFormat,
    #[serde(default = "default_currency_symbols")]
    pub currency_symbols: Vec<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub amount_tolerance: Decimal,
}

fn default_currency_symbols() -> Vec<String> {
    DEFAULT_CURRENCY_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

fn default_delimiter() -> char {
    ','
}

fn default_workers() -> usize {
    1
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            date_order: DateOrder::default(),
            number_format: NumberFormat::default(),
            currency_symbols: default_currency_symbols(),
            delimiter: default_delimiter(),
            workers: default_workers(),
            amount_tolerance: Decimal::ZERO,
        }
    }
}

impl Defaults {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            amount: AmountOptions {
                number_format: self.number_format,
                currency_symbols: self.currency_symbols.clone(),
            },
            date_order: self.date_order,
        }
    }

    pub fn tolerance(&self) -> std::result::Result<ToleranceConfig, ConfigError> {
        ToleranceConfig::new(self.amount_tolerance)
    }

    /// Apply environment overrides; unparseable values are ignored with a warning
    fn apply_overrides(&mut self, date_order: Option<&str>, workers: Option<&str>) {
        if let Some(value) = date_order {
            match value.parse::<DateOrder>() {
                Ok(order) => self.date_order = order,
                Err(e) => warn!("Ignoring RECONKIT_DATE_ORDER: {}", e),
            }
        }
        if let Some(value) = workers {
            match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.workers = n,
                _ => warn!("Ignoring RECONKIT_WORKERS: '{}' is not a positive number", value),
            }
        }
    }
}

/// Single-byte field delimiter from a setting such as `,`, `;`, `\t` or `tab`
pub fn parse_delimiter(value: &str) -> std::result::Result<u8, ConfigError> {
    match value {
        "\\t" | "tab" | "\t" => Ok(b'\t'),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => delimiter_byte(c),
                _ => Err(ConfigError::InvalidSetting(format!(
                    "delimiter must be a single character (got '{}')",
                    value
                ))),
            }
        }
    }
}

pub fn delimiter_byte(c: char) -> std::result::Result<u8, ConfigError> {
    if c.is_ascii() && c != '"' && c != '\n' && c != '\r' {
        Ok(c as u8)
    } else {
        Err(ConfigError::InvalidSetting(format!(
            "delimiter must be a single ASCII character other than a quote or newline (got {:?})",
            c
        )))
    }
}

/// A saved set of column assignments and options for a recurring reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconProfile {
    pub side_a: SideSchema,
    pub side_b: SideSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_tolerance: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_order: Option<DateOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<NumberFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
}

impl ReconProfile {
    pub fn new(side_a: SideSchema, side_b: SideSchema) -> Self {
        Self {
            side_a,
            side_b,
            amount_tolerance: None,
            date_order: None,
            number_format: None,
            delimiter: None,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.side_a.validate()?;
        self.side_b.validate()?;
        if let Some(tolerance) = self.amount_tolerance {
            ToleranceConfig::new(tolerance)?;
        }
        if let Some(c) = self.delimiter {
            delimiter_byte(c)?;
        }
        Ok(())
    }
}

/// reconkit configuration (effective view of settings.json)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub defaults: Defaults,
    pub profiles: HashMap<String, ReconProfile>,
    // Raw settings as read, so saving keeps unknown keys and file defaults
    raw: SettingsFile,
}

impl Config {
    /// Load config from the reconkit directory
    ///
    /// Defaults can be overridden with RECONKIT_DATE_ORDER and
    /// RECONKIT_WORKERS. A missing or unreadable settings file yields the
    /// built-in defaults.
    pub fn load(reconkit_dir: &Path) -> Result<Self> {
        let date_order = std::env::var("RECONKIT_DATE_ORDER").ok();
        let workers = std::env::var("RECONKIT_WORKERS").ok();
        Self::load_with_overrides(reconkit_dir, date_order.as_deref(), workers.as_deref())
    }

    fn load_with_overrides(reconkit_dir: &Path, date_order: Option<&str>, workers: Option<&str>) -> Result<Self> {
        let raw = read_settings(reconkit_dir)?;

        let mut defaults = raw.defaults.clone();
        defaults.apply_overrides(date_order, workers);

        Ok(Self {
            defaults,
            profiles: raw.profiles.clone(),
            raw,
        })
    }

    /// Save profiles (and defaults changed through [`Config::set_defaults`])
    ///
    /// Environment overrides are not written back.
    pub fn save(&self, reconkit_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(reconkit_dir)
            .with_context(|| format!("Failed to create {}", reconkit_dir.display()))?;

        // Re-read so concurrent edits to keys we don't manage survive
        let mut settings = read_settings(reconkit_dir)?;
        settings.defaults = self.raw.defaults.clone();
        settings.profiles = self.profiles.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(reconkit_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    pub fn set_defaults(&mut self, defaults: Defaults) {
        self.raw.defaults = defaults.clone();
        self.defaults = defaults;
    }

    pub fn profile(&self, name: &str) -> Option<&ReconProfile> {
        self.profiles.get(name)
    }

    /// Add or replace a profile after validating it
    pub fn upsert_profile(&mut self, name: impl Into<String>, profile: ReconProfile) -> std::result::Result<(), ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidSetting("profile name is empty".to_string()));
        }
        profile.validate()?;
        self.profiles.insert(name, profile);
        Ok(())
    }

    pub fn remove_profile(&mut self, name: &str) -> Option<ReconProfile> {
        self.profiles.remove(name)
    }

    /// Profile names, sorted
    pub fn profile_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn read_settings(reconkit_dir: &Path) -> Result<SettingsFile> {
    let settings_path = reconkit_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)
        .with_context(|| format!("Failed to read {}", settings_path.display()))?;
    Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!("Ignoring malformed {}: {}", settings_path.display(), e);
        SettingsFile::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tempfile::TempDir;

    fn profile() -> ReconProfile {
        let mut profile = ReconProfile::new(
            SideSchema::new("Reference", "Date", "Amount").with_description("Memo"),
            SideSchema::new("Invoice", "Posted", "Total"),
        );
        profile.amount_tolerance = Some(Decimal::from_str("0.01").unwrap());
        profile.date_order = Some(DateOrder::Mdy);
        profile
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_with_overrides(dir.path(), None, None).unwrap();
        assert_eq!(config.defaults, Defaults::default());
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_profile_roundtrip_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"theme": "dark", "defaults": {"dateOrder": "mdy", "delimiter": ";"}}"#,
        )
        .unwrap();

        let mut config = Config::load_with_overrides(dir.path(), None, None).unwrap();
        assert_eq!(config.defaults.date_order, DateOrder::Mdy);
        assert_eq!(config.defaults.delimiter, ';');
        assert_eq!(config.defaults.workers, 1);

        config.upsert_profile("monthly", profile()).unwrap();
        config.save(dir.path()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["profiles"]["monthly"]["sideA"]["keyColumn"], "Reference");

        let reloaded = Config::load_with_overrides(dir.path(), None, None).unwrap();
        assert_eq!(reloaded.profile("monthly"), Some(&profile()));
        assert_eq!(reloaded.profile_names(), vec!["monthly"]);
    }

    #[test]
    fn test_env_overrides_not_saved() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_with_overrides(dir.path(), Some("mdy"), Some("4")).unwrap();
        assert_eq!(config.defaults.date_order, DateOrder::Mdy);
        assert_eq!(config.defaults.workers, 4);
        config.save(dir.path()).unwrap();

        let reloaded = Config::load_with_overrides(dir.path(), None, None).unwrap();
        assert_eq!(reloaded.defaults.date_order, DateOrder::Dmy);
        assert_eq!(reloaded.defaults.workers, 1);
    }

    #[test]
    fn test_bad_env_override_ignored() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_with_overrides(dir.path(), Some("ydm"), Some("0")).unwrap();
        assert_eq!(config.defaults.date_order, DateOrder::Dmy);
        assert_eq!(config.defaults.workers, 1);
    }

    #[test]
    fn test_malformed_settings_fall_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ not json").unwrap();
        let config = Config::load_with_overrides(dir.path(), None, None).unwrap();
        assert_eq!(config.defaults, Defaults::default());
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let mut config = Config::default();
        let mut bad = profile();
        bad.amount_tolerance = Some(Decimal::from_str("-1").unwrap());
        assert!(matches!(
            config.upsert_profile("bad", bad),
            Err(ConfigError::NegativeTolerance(_))
        ));
        assert!(config.upsert_profile(" ", profile()).is_err());
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("\"").is_err());
        assert!(parse_delimiter("§").is_err());
    }
}
