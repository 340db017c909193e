//! Closed-position history summaries.
//!
//! Groups records by strategy type or market regime and reports how well
//! each group captured its favorable moves.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use exitguard_core::ClosedPositionRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Strategy,
    Regime,
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupBy::Strategy => "strategy",
            GroupBy::Regime => "regime",
        })
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strategy" | "strategy_type" => Ok(GroupBy::Strategy),
            "regime" | "market_regime" => Ok(GroupBy::Regime),
            other => Err(format!("unknown grouping '{other}' (expected strategy or regime)")),
        }
    }
}

/// Summary statistics for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub count: usize,
    pub mean_profit_pct: f64,
    pub median_profit_pct: f64,
    pub mean_efficiency: f64,
    /// Fraction of records closed with positive profit.
    pub win_rate: f64,
    /// Fraction of records that took at least one partial exit.
    pub partial_exit_rate: f64,
}

pub fn summarize(records: &[ClosedPositionRecord], by: GroupBy) -> BTreeMap<String, GroupSummary> {
    match by {
        GroupBy::Strategy => group_and_summarize(records, |r| r.strategy_type.to_string()),
        GroupBy::Regime => group_and_summarize(records, |r| r.market_regime.to_string()),
    }
}

fn group_and_summarize<F>(
    records: &[ClosedPositionRecord],
    key_fn: F,
) -> BTreeMap<String, GroupSummary>
where
    F: Fn(&ClosedPositionRecord) -> String,
{
    let mut groups: BTreeMap<String, Vec<&ClosedPositionRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(key_fn(record)).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(key, group)| {
            let mut profits: Vec<f64> = group.iter().map(|r| r.profit_pct).collect();
            profits.sort_by(|a, b| a.total_cmp(b));

            let n = profits.len();
            let mean_profit_pct = profits.iter().sum::<f64>() / n as f64;
            let median_profit_pct = if n % 2 == 0 {
                (profits[n / 2 - 1] + profits[n / 2]) / 2.0
            } else {
                profits[n / 2]
            };
            let mean_efficiency = group.iter().map(|r| r.efficiency).sum::<f64>() / n as f64;
            let win_rate = group.iter().filter(|r| r.profit_pct > 0.0).count() as f64 / n as f64;
            let partial_exit_rate =
                group.iter().filter(|r| r.had_partial_exits()).count() as f64 / n as f64;

            (
                key,
                GroupSummary {
                    count: n,
                    mean_profit_pct,
                    median_profit_pct,
                    mean_efficiency,
                    win_rate,
                    partial_exit_rate,
                },
            )
        })
        .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────
