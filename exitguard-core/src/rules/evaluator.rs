//! Ordered profit-rule evaluation: first positive match wins.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::RulesConfig;
use crate::domain::{ExitReason, MarketRegime, MarketSnapshot, Position};

use super::{
    DynamicVolatilityRule, IndicatorRule, PriceReversalRule, ProfitRule, ProfitRuleKind,
    TargetProfitRule, TimeBasedRule,
};

/// The rule that fired and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule: &'static str,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfitRuleEvaluator {
    rules: Vec<ProfitRuleKind>,
}

impl ProfitRuleEvaluator {
    /// No rules; only the trailing stop or a manual close can end the position.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the enabled rules in fixed order, with `regime` overrides applied.
    pub fn from_config(cfg: &RulesConfig, regime: MarketRegime) -> Self {
        let overrides = cfg.regime_overrides.get(&regime);
        let mut rules = Vec::new();

        if cfg.time_based.enabled {
            let hours = overrides
                .and_then(|o| o.max_hold_time)
                .unwrap_or(cfg.time_based.max_hold_time);
            rules.push(ProfitRuleKind::TimeBased(TimeBasedRule::new(hours)));
        }
        if cfg.target_profit.enabled {
            let target = overrides
                .and_then(|o| o.profit_target)
                .unwrap_or(cfg.target_profit.profit_target);
            rules.push(ProfitRuleKind::TargetProfit(TargetProfitRule::new(target)));
        }
        if cfg.indicator.enabled {
            rules.push(ProfitRuleKind::Indicator(IndicatorRule::new(
                cfg.indicator.rsi_overbought,
                cfg.indicator.rsi_oversold,
            )));
        }
        if cfg.price_reversal.enabled {
            rules.push(ProfitRuleKind::PriceReversal(PriceReversalRule::new(
                cfg.price_reversal.candle_count,
            )));
        }
        if cfg.dynamic_volatility.enabled {
            rules.push(ProfitRuleKind::DynamicVolatility(
                DynamicVolatilityRule::from_config(&cfg.dynamic_volatility),
            ));
        }

        Self { rules }
    }

    pub fn with_rule(mut self, rule: ProfitRuleKind) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ProfitRuleKind] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run rules in order; a rule lacking data abstains with a warning.
    pub fn evaluate(
        &self,
        position: &Position,
        price: f64,
        now: DateTime<Utc>,
        market: &MarketSnapshot,
    ) -> Option<RuleMatch> {
        for rule in &self.rules {
            match rule.should_close(position, price, now, market) {
                Ok(Some(reason)) => {
                    return Some(RuleMatch {
                        rule: rule.name(),
                        reason,
                    })
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(rule = rule.name(), error = %err, "profit rule abstained");
                }
            }
        }
        None
    }
}
