//! Typed exit configuration.
//!
//! One `ExitConfig` is built at startup and validated as a whole. Strategy
//! parameters are stored per (strategy, regime) key in a permissive shape that
//! mirrors the configuration surface, then resolved into typed parameters.
//! Resolution fails with the name of the first missing or invalid field; there
//! is no fallback to hardcoded values.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{MarketRegime, StrategyType};
use crate::error::ConfigError;
use crate::partial_exit::PartialExitLevel;
use crate::trailing::{AtrParams, PercentageParams, StepParams, StrategyParams};

/// Default initial stop distance for the ATR strategy when no ATR is known at entry.
pub const DEFAULT_INITIAL_STOP_PERCENT: f64 = 2.0;

/// Default cap on persisted closed-position records.
pub const DEFAULT_MAX_HISTORY_ENTRIES: usize = 1000;

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitConfig {
    #[serde(default)]
    pub volatility: VolatilityConfig,
    #[serde(default)]
    pub strategies: BTreeMap<StrategyType, BTreeMap<MarketRegime, StrategyEntry>>,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Raw parameters for one (strategy, regime) key.
///
/// Every strategy reads only its own fields; the rest are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyEntry {
    // percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_callback: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_callback: Option<f64>,
    #[serde(default)]
    pub use_dynamic_callback: bool,

    // step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profit_steps: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub callback_steps: Vec<f64>,

    // atr_based
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atr_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_profit_activation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_stop_percent: Option<f64>,

    // any strategy
    #[serde(default)]
    pub partial_exits: Vec<PartialExitLevel>,
}

/// Typed parameters resolved for one (strategy, regime) key.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStrategy {
    pub params: StrategyParams,
    pub partial_exits: Vec<PartialExitLevel>,
}

/// Volatility → callback multiplier mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    pub enabled: bool,
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub low_multiplier: f64,
    pub high_multiplier: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            low_threshold: 0.01,
            high_threshold: 0.05,
            low_multiplier: 0.8,
            high_multiplier: 1.5,
        }
    }
}

/// Profit-rule configuration. Rule order is fixed; only enablement and
/// parameters are configurable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub time_based: TimeBasedConfig,
    #[serde(default)]
    pub target_profit: TargetProfitConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub price_reversal: PriceReversalConfig,
    #[serde(default)]
    pub dynamic_volatility: DynamicVolatilityConfig,
    /// Per-regime overrides stamped into positions opened in that regime.
    #[serde(default)]
    pub regime_overrides: BTreeMap<MarketRegime, RuleOverrides>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBasedConfig {
    pub enabled: bool,
    /// Hours.
    pub max_hold_time: f64,
}

impl Default for TimeBasedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_hold_time: 48.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetProfitConfig {
    pub enabled: bool,
    /// Percent.
    pub profit_target: f64,
}

impl Default for TargetProfitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            profit_target: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub enabled: bool,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceReversalConfig {
    pub enabled: bool,
    pub candle_count: usize,
}

impl Default for PriceReversalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            candle_count: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicVolatilityConfig {
    pub enabled: bool,
    /// Volatility at or below this is "low".
    pub low_vol_threshold: f64,
    /// Volatility at or below this (and above low) is "medium"; above is "high".
    pub medium_vol_threshold: f64,
    pub low_vol_target: f64,
    pub medium_vol_target: f64,
    pub high_vol_target: f64,
}

impl Default for DynamicVolatilityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            low_vol_threshold: 0.01,
            medium_vol_threshold: 0.03,
            low_vol_target: 1.5,
            medium_vol_target: 3.0,
            high_vol_target: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_target: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hold_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// JSON file for closed positions. `None` keeps history in memory only.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_max_history_entries")]
    pub max_history_entries: usize,
}

fn default_max_history_entries() -> usize {
    DEFAULT_MAX_HISTORY_ENTRIES
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_history_entries: DEFAULT_MAX_HISTORY_ENTRIES,
        }
    }
}

// ─── Resolution ──────────────────────────────────────────────────────

impl ExitConfig {
    /// Empty strategy table with default rules, volatility and history.
    pub fn empty() -> Self {
        Self {
            volatility: VolatilityConfig::default(),
            strategies: BTreeMap::new(),
            rules: RulesConfig::default(),
            history: HistoryConfig::default(),
        }
    }

    /// Insert or replace one (strategy, regime) entry.
    pub fn with_strategy(
        mut self,
        strategy: StrategyType,
        regime: MarketRegime,
        entry: StrategyEntry,
    ) -> Self {
        self.strategies
            .entry(strategy)
            .or_default()
            .insert(regime, entry);
        self
    }

    /// Resolve typed parameters for one key.
    pub fn resolve(
        &self,
        strategy: StrategyType,
        regime: MarketRegime,
    ) -> Result<ResolvedStrategy, ConfigError> {
        let regimes = self
            .strategies
            .get(&strategy)
            .ok_or(ConfigError::MissingStrategy(strategy))?;
        let entry = regimes
            .get(&regime)
            .ok_or(ConfigError::MissingRegime { strategy, regime })?;

        let ctx = FieldCtx { strategy, regime };
        let params = match strategy {
            StrategyType::Percentage => {
                StrategyParams::Percentage(resolve_percentage(&ctx, entry)?)
            }
            StrategyType::Step => StrategyParams::Step(resolve_step(&ctx, entry)?),
            StrategyType::AtrBased => StrategyParams::AtrBased(resolve_atr(&ctx, entry)?),
        };
        let partial_exits = resolve_partial_exits(&ctx, &entry.partial_exits)?;

        Ok(ResolvedStrategy {
            params,
            partial_exits,
        })
    }

    /// Validate every section. A config that passes can open a position for
    /// every key present in the strategy table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (strategy, regimes) in &self.strategies {
            for regime in regimes.keys() {
                self.resolve(*strategy, *regime)?;
            }
        }
        self.volatility.validate()?;
        self.rules.validate()?;
        if self.history.max_history_entries == 0 {
            return Err(ConfigError::InvalidHistory(
                "max_history_entries must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Deterministic BLAKE3 fingerprint of the whole configuration.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Built-in preset covering every strategy × regime key.
    ///
    /// Used only when asked for explicitly (e.g. `--builtin` on the CLI);
    /// a config file that fails to load is an error, never a reason to use this.
    pub fn builtin() -> Self {
        let mut cfg = Self::empty();
        for regime in MarketRegime::ALL {
            let (activation, callback, min_cb, max_cb, dynamic) = match regime {
                MarketRegime::Trending => (1.0, 0.5, 0.3, 1.0, true),
                MarketRegime::Ranging => (0.8, 0.4, 0.2, 0.6, false),
                MarketRegime::Volatile => (1.5, 0.8, 0.5, 1.5, true),
                MarketRegime::Neutral => (1.0, 0.5, 0.3, 0.8, false),
            };
            let partials = match regime {
                MarketRegime::Trending | MarketRegime::Volatile => vec![
                    PartialExitLevel::new(3.0, 0.3),
                    PartialExitLevel::new(5.0, 0.5),
                ],
                MarketRegime::Ranging | MarketRegime::Neutral => {
                    vec![PartialExitLevel::new(2.0, 0.5)]
                }
            };
            cfg = cfg.with_strategy(
                StrategyType::Percentage,
                regime,
                StrategyEntry {
                    activation_percent: Some(activation),
                    callback_percent: Some(callback),
                    min_callback: Some(min_cb),
                    max_callback: Some(max_cb),
                    use_dynamic_callback: dynamic,
                    partial_exits: partials.clone(),
                    ..StrategyEntry::default()
                },
            );

            let (profit_steps, callback_steps) = match regime {
                MarketRegime::Volatile => (vec![1.5, 3.0, 6.0], vec![0.4, 0.8, 1.5]),
                _ => (vec![1.0, 2.0, 5.0], vec![0.2, 0.5, 1.0]),
            };
            cfg = cfg.with_strategy(
                StrategyType::Step,
                regime,
                StrategyEntry {
                    profit_steps,
                    callback_steps,
                    partial_exits: partials.clone(),
                    ..StrategyEntry::default()
                },
            );

            let atr_multiplier = match regime {
                MarketRegime::Trending => 2.0,
                MarketRegime::Ranging => 1.5,
                MarketRegime::Volatile => 3.0,
                MarketRegime::Neutral => 2.0,
            };
            cfg = cfg.with_strategy(
                StrategyType::AtrBased,
                regime,
                StrategyEntry {
                    atr_multiplier: Some(atr_multiplier),
                    min_profit_activation: Some(1.0),
                    initial_stop_percent: Some(DEFAULT_INITIAL_STOP_PERCENT),
                    partial_exits: partials,
                    ..StrategyEntry::default()
                },
            );
        }
        cfg.rules.regime_overrides.insert(
            MarketRegime::Ranging,
            RuleOverrides {
                profit_target: Some(4.0),
                max_hold_time: Some(24.0),
            },
        );
        cfg
    }
}

struct FieldCtx {
    strategy: StrategyType,
    regime: MarketRegime,
}

impl FieldCtx {
    fn missing(&self, field: &'static str) -> ConfigError {
        ConfigError::MissingField {
            strategy: self.strategy,
            regime: self.regime,
            field,
        }
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidField {
            strategy: self.strategy,
            regime: self.regime,
            field,
            reason: reason.into(),
        }
    }

    fn require(&self, value: Option<f64>, field: &'static str) -> Result<f64, ConfigError> {
        let v = value.ok_or_else(|| self.missing(field))?;
        if !v.is_finite() {
            return Err(self.invalid(field, "must be finite"));
        }
        Ok(v)
    }

    /// Percent distance strictly inside (0, 100).
    fn check_callback(&self, v: f64, field: &'static str) -> Result<f64, ConfigError> {
        if v.is_finite() && v > 0.0 && v < 100.0 {
            Ok(v)
        } else {
            Err(self.invalid(field, format!("{v} not in (0, 100)")))
        }
    }

    fn check_non_negative(&self, v: f64, field: &'static str) -> Result<f64, ConfigError> {
        if v >= 0.0 {
            Ok(v)
        } else {
            Err(self.invalid(field, format!("{v} is negative")))
        }
    }
}

fn resolve_percentage(ctx: &FieldCtx, e: &StrategyEntry) -> Result<PercentageParams, ConfigError> {
    let activation_percent = ctx.check_non_negative(
        ctx.require(e.activation_percent, "activation_percent")?,
        "activation_percent",
    )?;
    let callback_percent = ctx.check_callback(
        ctx.require(e.callback_percent, "callback_percent")?,
        "callback_percent",
    )?;

    let (min_callback, max_callback) = if e.use_dynamic_callback {
        let min =
            ctx.check_callback(ctx.require(e.min_callback, "min_callback")?, "min_callback")?;
        let max =
            ctx.check_callback(ctx.require(e.max_callback, "max_callback")?, "max_callback")?;
        if min > max {
            return Err(ctx.invalid("min_callback", format!("{min} exceeds max_callback {max}")));
        }
        (min, max)
    } else {
        (
            e.min_callback.unwrap_or(callback_percent),
            e.max_callback.unwrap_or(callback_percent),
        )
    };

    Ok(PercentageParams {
        activation_percent,
        callback_percent,
        min_callback,
        max_callback,
        use_dynamic_callback: e.use_dynamic_callback,
    })
}

fn resolve_step(ctx: &FieldCtx, e: &StrategyEntry) -> Result<StepParams, ConfigError> {
    if e.profit_steps.is_empty() {
        return Err(ctx.missing("profit_steps"));
    }
    if e.callback_steps.is_empty() {
        return Err(ctx.missing("callback_steps"));
    }
    if e.profit_steps.len() != e.callback_steps.len() {
        return Err(ctx.invalid(
            "callback_steps",
            format!(
                "{} callbacks for {} profit steps",
                e.callback_steps.len(),
                e.profit_steps.len()
            ),
        ));
    }
    for &p in &e.profit_steps {
        if !p.is_finite() {
            return Err(ctx.invalid("profit_steps", "must be finite"));
        }
    }
    if e.profit_steps.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ctx.invalid("profit_steps", "must be strictly ascending"));
    }
    for &cb in &e.callback_steps {
        ctx.check_callback(cb, "callback_steps")?;
    }

    Ok(StepParams {
        profit_steps: e.profit_steps.clone(),
        callback_steps: e.callback_steps.clone(),
    })
}

fn resolve_atr(ctx: &FieldCtx, e: &StrategyEntry) -> Result<AtrParams, ConfigError> {
    let atr_multiplier = ctx.require(e.atr_multiplier, "atr_multiplier")?;
    if atr_multiplier <= 0.0 {
        return Err(ctx.invalid("atr_multiplier", "must be positive"));
    }
    let min_profit_activation = ctx.check_non_negative(
        ctx.require(e.min_profit_activation, "min_profit_activation")?,
        "min_profit_activation",
    )?;
    let initial_stop_percent = ctx.check_callback(
        e.initial_stop_percent.unwrap_or(DEFAULT_INITIAL_STOP_PERCENT),
        "initial_stop_percent",
    )?;

    Ok(AtrParams {
        atr_multiplier,
        min_profit_activation,
        initial_stop_percent,
    })
}

fn resolve_partial_exits(
    ctx: &FieldCtx,
    levels: &[PartialExitLevel],
) -> Result<Vec<PartialExitLevel>, ConfigError> {
    let mut total = 0.0;
    for level in levels {
        if !level.threshold.is_finite() {
            return Err(ctx.invalid("partial_exits", "threshold must be finite"));
        }
        if !(level.fraction > 0.0 && level.fraction <= 1.0) {
            return Err(ctx.invalid(
                "partial_exits",
                format!("fraction {} not in (0, 1]", level.fraction),
            ));
        }
        total += level.fraction;
    }
    if total > 1.0 + 1e-9 {
        return Err(ctx.invalid(
            "partial_exits",
            format!("fractions sum to {total}, more than the whole position"),
        ));
    }
    Ok(levels.to_vec())
}

impl VolatilityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        let all_finite = [
            self.low_threshold,
            self.high_threshold,
            self.low_multiplier,
            self.high_multiplier,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !all_finite {
            return Err(ConfigError::InvalidVolatility("values must be finite".into()));
        }
        if self.high_threshold <= self.low_threshold {
            return Err(ConfigError::InvalidVolatility(format!(
                "high_threshold {} must exceed low_threshold {}",
                self.high_threshold, self.low_threshold
            )));
        }
        if self.low_multiplier <= 0.0 || self.high_multiplier <= 0.0 {
            return Err(ConfigError::InvalidVolatility(
                "multipliers must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl RulesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(rule: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::InvalidRule {
                rule,
                reason: reason.into(),
            }
        }

        if !(self.time_based.max_hold_time.is_finite() && self.time_based.max_hold_time > 0.0) {
            return Err(invalid("time_based", "max_hold_time must be positive"));
        }
        if !(self.target_profit.profit_target.is_finite() && self.target_profit.profit_target > 0.0)
        {
            return Err(invalid("target_profit", "profit_target must be positive"));
        }
        let ind = &self.indicator;
        if !(0.0..=100.0).contains(&ind.rsi_oversold)
            || !(0.0..=100.0).contains(&ind.rsi_overbought)
            || ind.rsi_oversold >= ind.rsi_overbought
        {
            return Err(invalid(
                "indicator",
                "need 0 <= rsi_oversold < rsi_overbought <= 100",
            ));
        }
        if self.price_reversal.candle_count == 0 {
            return Err(invalid("price_reversal", "candle_count must be >= 1"));
        }
        let dv = &self.dynamic_volatility;
        if !(dv.low_vol_threshold > 0.0 && dv.low_vol_threshold < dv.medium_vol_threshold) {
            return Err(invalid(
                "dynamic_volatility",
                "need 0 < low_vol_threshold < medium_vol_threshold",
            ));
        }
        if [dv.low_vol_target, dv.medium_vol_target, dv.high_vol_target]
            .iter()
            .any(|t| !(t.is_finite() && *t > 0.0))
        {
            return Err(invalid("dynamic_volatility", "targets must be positive"));
        }
        for (regime, ov) in &self.regime_overrides {
            if ov.profit_target.is_some_and(|t| !(t.is_finite() && t > 0.0)) {
                return Err(invalid(
                    "target_profit",
                    format!("override for {regime} must be positive"),
                ));
            }
            if ov.max_hold_time.is_some_and(|h| !(h.is_finite() && h > 0.0)) {
                return Err(invalid(
                    "time_based",
                    format!("override for {regime} must be positive"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percentage_entry() -> StrategyEntry {
        StrategyEntry {
            activation_percent: Some(1.0),
            callback_percent: Some(0.5),
            ..StrategyEntry::default()
        }
    }

    #[test]
    fn builtin_config_validates() {
        let cfg = ExitConfig::builtin();
        cfg.validate().unwrap();
        for st in StrategyType::ALL {
            for regime in MarketRegime::ALL {
                assert!(cfg.resolve(st, regime).is_ok(), "{st}/{regime}");
            }
        }
    }

    #[test]
    fn missing_strategy_and_regime_are_named() {
        let cfg = ExitConfig::empty().with_strategy(
            StrategyType::Percentage,
            MarketRegime::Trending,
            percentage_entry(),
        );
        assert_eq!(
            cfg.resolve(StrategyType::Step, MarketRegime::Trending),
            Err(ConfigError::MissingStrategy(StrategyType::Step))
        );
        assert_eq!(
            cfg.resolve(StrategyType::Percentage, MarketRegime::Ranging),
            Err(ConfigError::MissingRegime {
                strategy: StrategyType::Percentage,
                regime: MarketRegime::Ranging,
            })
        );
    }

    #[test]
    fn missing_field_fails_fast() {
        let entry = StrategyEntry {
            activation_percent: Some(1.0),
            ..StrategyEntry::default()
        };
        let cfg = ExitConfig::empty().with_strategy(
            StrategyType::Percentage,
            MarketRegime::Trending,
            entry,
        );
        match cfg.resolve(StrategyType::Percentage, MarketRegime::Trending) {
            Err(ConfigError::MissingField { field, .. }) => assert_eq!(field, "callback_percent"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn dynamic_callback_requires_bounds() {
        let entry = StrategyEntry {
            use_dynamic_callback: true,
            min_callback: Some(0.3),
            ..percentage_entry()
        };
        let cfg = ExitConfig::empty().with_strategy(
            StrategyType::Percentage,
            MarketRegime::Trending,
            entry,
        );
        match cfg.resolve(StrategyType::Percentage, MarketRegime::Trending) {
            Err(ConfigError::MissingField { field, .. }) => assert_eq!(field, "max_callback"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn step_arrays_must_be_parallel_and_ascending() {
        let mismatched = StrategyEntry {
            profit_steps: vec![1.0, 2.0],
            callback_steps: vec![0.2],
            ..StrategyEntry::default()
        };
        let cfg = ExitConfig::empty().with_strategy(
            StrategyType::Step,
            MarketRegime::Trending,
            mismatched,
        );
        assert!(matches!(
            cfg.resolve(StrategyType::Step, MarketRegime::Trending),
            Err(ConfigError::InvalidField { field: "callback_steps", .. })
        ));

        let descending = StrategyEntry {
            profit_steps: vec![2.0, 1.0],
            callback_steps: vec![0.2, 0.5],
            ..StrategyEntry::default()
        };
        let cfg = ExitConfig::empty().with_strategy(
            StrategyType::Step,
            MarketRegime::Trending,
            descending,
        );
        assert!(matches!(
            cfg.resolve(StrategyType::Step, MarketRegime::Trending),
            Err(ConfigError::InvalidField { field: "profit_steps", .. })
        ));
    }

    #[test]
    fn atr_defaults_initial_stop_percent() {
        let entry = StrategyEntry {
            atr_multiplier: Some(2.0),
            min_profit_activation: Some(1.0),
            ..StrategyEntry::default()
        };
        let cfg =
            ExitConfig::empty().with_strategy(StrategyType::AtrBased, MarketRegime::Neutral, entry);
        let resolved = cfg
            .resolve(StrategyType::AtrBased, MarketRegime::Neutral)
            .unwrap();
        match resolved.params {
            StrategyParams::AtrBased(p) => {
                assert_eq!(p.initial_stop_percent, DEFAULT_INITIAL_STOP_PERCENT)
            }
            other => panic!("expected ATR params, got {other:?}"),
        }
    }

    #[test]
    fn partial_fractions_cannot_exceed_whole() {
        let entry = StrategyEntry {
            partial_exits: vec![PartialExitLevel::new(2.0, 0.6), PartialExitLevel::new(4.0, 0.6)],
            ..percentage_entry()
        };
        let cfg = ExitConfig::empty().with_strategy(
            StrategyType::Percentage,
            MarketRegime::Trending,
            entry,
        );
        assert!(matches!(
            cfg.resolve(StrategyType::Percentage, MarketRegime::Trending),
            Err(ConfigError::InvalidField { field: "partial_exits", .. })
        ));
    }

    #[test]
    fn volatility_thresholds_must_be_ordered() {
        let mut cfg = ExitConfig::builtin();
        cfg.volatility.enabled = true;
        cfg.volatility.high_threshold = cfg.volatility.low_threshold;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidVolatility(_))));
    }

    #[test]
    fn rsi_bounds_are_checked() {
        let mut cfg = ExitConfig::builtin();
        cfg.rules.indicator.rsi_oversold = 80.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidRule { rule: "indicator", .. })
        ));
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = ExitConfig::builtin();
        let mut b = ExitConfig::builtin();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        b.rules.target_profit.profit_target = 7.5;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = ExitConfig::builtin();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let back: ExitConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
