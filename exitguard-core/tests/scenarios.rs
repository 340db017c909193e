//! End-to-end lifecycle scenarios.
//!
//! Tests:
//! 1. Percentage stop on a long: activation, ratchet, stop trigger.
//! 2. Step stop on a short: step advance and trigger after pullback.
//! 3. Partial exits: once per level, breakeven hand-off, blended close.
//! 4. Time rule closes regardless of price.
//! 5. Full liquidation by partials closes in the same update.
//! 6. close_position idempotency.

use chrono::{DateTime, Duration, TimeZone, Utc};
use exitguard_core::config::{ExitConfig, StrategyEntry};
use exitguard_core::domain::{
    ExitReason, MarketRegime, MarketSnapshot, PositionSpec, PositionStatus, Side, StrategyType,
};
use exitguard_core::partial_exit::PartialExitLevel;
use exitguard_core::{ExitDecision, PositionLifecycleManager};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
}

fn minutes(m: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(m)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn manager_with(strategy: StrategyType, entry: StrategyEntry) -> PositionLifecycleManager {
    let cfg = ExitConfig::empty().with_strategy(strategy, MarketRegime::Trending, entry);
    PositionLifecycleManager::new(cfg).unwrap()
}

fn percentage_entry(activation: f64, callback: f64) -> StrategyEntry {
    StrategyEntry {
        activation_percent: Some(activation),
        callback_percent: Some(callback),
        use_dynamic_callback: false,
        ..StrategyEntry::default()
    }
}

fn open(
    m: &PositionLifecycleManager,
    symbol: &str,
    side: Side,
    entry: f64,
    strategy: StrategyType,
) -> exitguard_core::Position {
    m.initialize_position(PositionSpec::new(
        symbol,
        side,
        entry,
        1.0,
        t0(),
        strategy,
        MarketRegime::Trending,
    ))
    .unwrap()
}

// ──────────────────────────────────────────────
// Scenarios
// ──────────────────────────────────────────────

#[test]
fn long_percentage_trailing_stop() {
    let m = manager_with(StrategyType::Percentage, percentage_entry(1.0, 0.5));
    let mut p = open(&m, "BTCUSDT", Side::Long, 50_000.0, StrategyType::Percentage);
    let snap = MarketSnapshot::empty();

    p = m.update_position(p, 50_100.0, None, minutes(1)).position;
    assert!(!p.trailing_activated());
    assert_eq!(m.check_exit_conditions(&p, 50_100.0, minutes(1), &snap), ExitDecision::hold());

    p = m.update_position(p, 50_600.0, None, minutes(2)).position;
    assert!(p.trailing_activated());
    assert!(approx(p.stop_price(), 50_347.0));

    p = m.update_position(p, 51_200.0, None, minutes(3)).position;
    assert!(approx(p.stop_price(), 51_200.0 * 0.995));

    p = m.update_position(p, 50_900.0, None, minutes(4)).position;
    assert!(approx(p.stop_price(), 51_200.0 * 0.995), "pullback keeps the stop");
    let decision = m.check_exit_conditions(&p, 50_900.0, minutes(4), &snap);
    assert_eq!(decision, ExitDecision::close(ExitReason::StopLoss));

    let closed = m.close_position(p, 50_900.0, ExitReason::StopLoss, minutes(4));
    let exit = closed.exit().unwrap();
    assert!(approx(exit.profit_pct, 1.8));
    assert!(approx(exit.max_profit_pct, 2.4));
    assert!(approx(exit.efficiency, 75.0));
}

#[test]
fn short_step_trailing_stop() {
    let m = manager_with(
        StrategyType::Step,
        StrategyEntry {
            profit_steps: vec![1.0, 2.0, 5.0],
            callback_steps: vec![0.2, 0.5, 1.0],
            ..StrategyEntry::default()
        },
    );
    let mut p = open(&m, "ETHUSDT", Side::Short, 2000.0, StrategyType::Step);
    let snap = MarketSnapshot::empty();

    p = m.update_position(p, 1980.0, None, minutes(1)).position;
    assert!(p.trailing_activated());
    assert!(approx(p.stop_price(), 1983.96));

    p = m.update_position(p, 1960.0, None, minutes(2)).position;
    assert!(approx(p.stop_price(), 1969.80));

    p = m.update_position(p, 1975.0, None, minutes(3)).position;
    assert!(approx(p.stop_price(), 1969.80));
    assert_eq!(
        m.check_exit_conditions(&p, 1975.0, minutes(3), &snap),
        ExitDecision::close(ExitReason::StopLoss)
    );
}

#[test]
fn partial_exits_then_stop_blends_all_legs() {
    let m = manager_with(
        StrategyType::Percentage,
        StrategyEntry {
            partial_exits: vec![
                PartialExitLevel::new(3.0, 0.3),
                PartialExitLevel::new(5.0, 0.5),
            ],
            ..percentage_entry(10.0, 0.5)
        },
    );
    let mut p = open(&m, "SOLUSDT", Side::Long, 100.0, StrategyType::Percentage);

    let out = m.update_position(p, 103.0, None, minutes(1));
    assert_eq!(out.fired.len(), 1);
    assert!(out.breakeven_moved);
    p = out.position;
    assert!(approx(p.remaining_position(), 0.7));
    assert_eq!(p.stop_price(), 100.0);

    let out = m.update_position(p, 103.5, None, minutes(2));
    assert!(out.fired.is_empty(), "level 1 fires once");
    p = out.position;

    let out = m.update_position(p, 105.0, None, minutes(3));
    assert_eq!(out.fired.len(), 1);
    assert!(!out.breakeven_moved);
    p = out.position;
    assert!(approx(p.remaining_position(), 0.2));
    assert_eq!(p.partial_exits().len(), 2);

    p = m.update_position(p, 100.0, None, minutes(4)).position;
    assert_eq!(
        m.check_exit_conditions(&p, 100.0, minutes(4), &MarketSnapshot::empty()),
        ExitDecision::close(ExitReason::StopLoss)
    );
    let closed = m.close_position(p, 100.0, ExitReason::StopLoss, minutes(4));
    let exit = closed.exit().unwrap();
    assert!(approx(exit.profit_pct, 0.3 * 3.0 + 0.5 * 5.0));
    assert!(approx(exit.exit_price, 0.3 * 103.0 + 0.5 * 105.0 + 0.2 * 100.0));
    assert!(approx(exit.max_profit_pct, 5.0));
    assert!(approx(exit.efficiency, 68.0));
    assert_eq!(closed.remaining_position(), 0.0);
}

#[test]
fn time_rule_closes_regardless_of_price() {
    let m = PositionLifecycleManager::new(ExitConfig::builtin()).unwrap();
    let p = m
        .initialize_position(PositionSpec::new(
            "ADAUSDT",
            Side::Long,
            1.0,
            100.0,
            t0() - Duration::hours(50),
            StrategyType::AtrBased,
            MarketRegime::Neutral,
        ))
        .unwrap();
    for price in [0.9, 1.0, 1.05] {
        let d = m.check_exit_conditions(&p, price, t0(), &MarketSnapshot::empty());
        assert_eq!(d, ExitDecision::close(ExitReason::TimeLimit), "price {price}");
    }
}

#[test]
fn full_liquidation_closes_in_same_update() {
    let m = manager_with(
        StrategyType::Percentage,
        StrategyEntry {
            partial_exits: vec![
                PartialExitLevel::new(2.0, 0.5),
                PartialExitLevel::new(4.0, 0.5),
            ],
            ..percentage_entry(10.0, 0.5)
        },
    );
    let p = open(&m, "XRPUSDT", Side::Long, 100.0, StrategyType::Percentage);
    let p = m.update_position(p, 102.0, None, minutes(1)).position;
    let out = m.update_position(p, 104.0, None, minutes(2));
    assert!(out.closed);
    let p = out.position;
    assert_eq!(p.remaining_position(), 0.0);
    assert_eq!(p.status(), PositionStatus::Closed);
    let exit = p.exit().unwrap();
    assert_eq!(exit.exit_reason, ExitReason::PartialExitComplete);
    assert!(approx(exit.profit_pct, 3.0));
    assert!(approx(exit.exit_price, 103.0));
    assert_eq!(m.history().len(), 1);
}

#[test]
fn close_is_idempotent() {
    let m = manager_with(StrategyType::Percentage, percentage_entry(1.0, 0.5));
    let p = open(&m, "BNBUSDT", Side::Short, 300.0, StrategyType::Percentage);
    let p = m.update_position(p, 290.0, None, minutes(1)).position;
    let first = m.close_position(p, 291.0, ExitReason::Manual, minutes(2));
    let second = m.close_position(first.clone(), 250.0, ExitReason::StopLoss, minutes(3));
    assert_eq!(first, second);
    let exit = second.exit().unwrap();
    assert_eq!(exit.exit_reason, ExitReason::Manual);
    assert!(approx(exit.exit_price, 291.0));
    assert_eq!(m.history().len(), 1, "second close appends nothing");
}
