//! Load an `ExitConfig` from TOML or JSON, chosen by file extension.
//!
//! A file that fails to read, parse or validate is an error. There is no
//! fallback to built-in parameters.

use std::path::{Path, PathBuf};

use exitguard_core::{ConfigError, ExitConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing TOML config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("parsing JSON config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config format for {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Read, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<ExitConfig, LoadError> {
    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text, format, path)
}

/// Parse and validate config text. `origin` is only used in error messages.
pub fn parse_config(
    text: &str,
    format: ConfigFormat,
    origin: &Path,
) -> Result<ExitConfig, LoadError> {
    let config: ExitConfig = match format {
        ConfigFormat::Toml => toml::from_str(text).map_err(|source| LoadError::Toml {
            path: origin.to_path_buf(),
            source,
        })?,
        ConfigFormat::Json => serde_json::from_str(text).map_err(|source| LoadError::Json {
            path: origin.to_path_buf(),
            source,
        })?,
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exitguard_core::domain::{MarketRegime, StrategyType};

    const TOML_SAMPLE: &str = r#"
[volatility]
enabled = true
low_threshold = 0.01
high_threshold = 0.05
low_multiplier = 0.8
high_multiplier = 1.5

[strategies.percentage.trending]
activation_percent = 1.0
callback_percent = 0.5
min_callback = 0.3
max_callback = 1.0
use_dynamic_callback = true
partial_exits = [
    { threshold = 3.0, fraction = 0.3 },
    { threshold = 5.0, fraction = 0.5 },
]

[strategies.step.ranging]
profit_steps = [1.0, 2.0, 5.0]
callback_steps = [0.2, 0.5, 1.0]

[rules.time_based]
enabled = true
max_hold_time = 24.0

[rules.indicator]
enabled = true

[history]
max_history_entries = 50
"#;

    fn origin() -> PathBuf {
        PathBuf::from("test.toml")
    }

    #[test]
    fn toml_sections_parse_with_defaults() {
        let cfg = parse_config(TOML_SAMPLE, ConfigFormat::Toml, &origin()).unwrap();
        assert!(cfg.volatility.enabled);
        assert_eq!(cfg.rules.time_based.max_hold_time, 24.0);
        assert!(cfg.rules.indicator.enabled);
        assert_eq!(cfg.rules.indicator.rsi_overbought, 70.0);
        assert!(cfg.rules.target_profit.enabled);
        assert_eq!(cfg.history.max_history_entries, 50);
        let resolved = cfg
            .resolve(StrategyType::Percentage, MarketRegime::Trending)
            .unwrap();
        assert_eq!(resolved.partial_exits.len(), 2);
        assert!(cfg.resolve(StrategyType::Step, MarketRegime::Ranging).is_ok());
    }

    #[test]
    fn shipped_sample_config_is_valid() {
        let text = include_str!("../../configs/exitguard.toml");
        let cfg = parse_config(text, ConfigFormat::Toml, Path::new("exitguard.toml")).unwrap();
        assert_eq!(cfg.strategies.values().map(|r| r.len()).sum::<usize>(), 6);
        let overrides = &cfg.rules.regime_overrides[&MarketRegime::Ranging];
        assert_eq!(overrides.max_hold_time, Some(24.0));
        assert!(cfg.history.path.is_some());
    }

    #[test]
    fn json_round_trip_of_builtin() {
        let json = serde_json::to_string(&ExitConfig::builtin()).unwrap();
        let cfg = parse_config(&json, ConfigFormat::Json, Path::new("b.json")).unwrap();
        assert_eq!(cfg, ExitConfig::builtin());
    }

    #[test]
    fn missing_field_is_reported_not_defaulted() {
        let text = "[strategies.atr_based.volatile]\natr_multiplier = 2.0\n";
        match parse_config(text, ConfigFormat::Toml, &origin()) {
            Err(LoadError::Invalid(ConfigError::MissingField { field, .. })) => {
                assert_eq!(field, "min_profit_activation")
            }
            other => panic!("expected missing field, got {other:?}"),
        }
    }

    #[test]
    fn syntax_error_is_a_parse_error() {
        assert!(matches!(
            parse_config("[strategies", ConfigFormat::Toml, &origin()),
            Err(LoadError::Toml { .. })
        ));
        assert!(matches!(
            parse_config("{", ConfigFormat::Json, Path::new("x.json")),
            Err(LoadError::Json { .. })
        ));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.TOML")), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), None);
        assert!(matches!(
            load_config(Path::new("a.yaml")),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config(&dir.path().join("nope.toml")),
            Err(LoadError::Io { .. })
        ));
    }
}
