//! Closed-position history persistence.

use chrono::{DateTime, Duration, TimeZone, Utc};
use exitguard_core::config::{ExitConfig, StrategyEntry};
use exitguard_core::domain::{ExitReason, MarketRegime, PositionSpec, Side, StrategyType};
use exitguard_core::partial_exit::PartialExitLevel;
use exitguard_core::{ClosedPositionRecord, JsonHistoryStore, PositionLifecycleManager};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 15, 8, 30, 0).unwrap()
}

fn config_with_history(path: &std::path::Path, max: usize) -> ExitConfig {
    let mut cfg = ExitConfig::empty().with_strategy(
        StrategyType::Percentage,
        MarketRegime::Volatile,
        StrategyEntry {
            activation_percent: Some(10.0),
            callback_percent: Some(0.7),
            partial_exits: vec![
                PartialExitLevel::new(1.3, 0.25),
                PartialExitLevel::new(2.7, 0.35),
            ],
            ..StrategyEntry::default()
        },
    );
    cfg.history.path = Some(path.to_path_buf());
    cfg.history.max_history_entries = max;
    cfg
}

fn run_one(m: &PositionLifecycleManager, id: &str) {
    let p = m
        .initialize_position(
            PositionSpec::new(
                "LINKUSDT",
                Side::Short,
                17.3,
                42.0,
                t0(),
                StrategyType::Percentage,
                MarketRegime::Volatile,
            )
            .with_id(id),
        )
        .unwrap();
    let p = m.update_position(p, 17.05, None, t0() + Duration::minutes(7)).position;
    let p = m.update_position(p, 16.81, None, t0() + Duration::minutes(19)).position;
    m.close_position(p, 17.11, ExitReason::StopLoss, t0() + Duration::minutes(33));
}

#[test]
fn file_round_trip_reproduces_records_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history").join("closed.json");
    let m = PositionLifecycleManager::new(config_with_history(&path, 100)).unwrap();
    run_one(&m, "p-1");

    let in_memory = m.history();
    assert_eq!(in_memory.len(), 1);
    assert_eq!(in_memory[0].partial_exits.len(), 2);

    let on_disk = JsonHistoryStore::new(&path).load().unwrap();
    assert_eq!(on_disk, in_memory);

    // Through a plain JSON string as well.
    let json = serde_json::to_string(&in_memory[0]).unwrap();
    let back: ClosedPositionRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, in_memory[0]);
    assert_eq!(back.profit_pct.to_bits(), in_memory[0].profit_pct.to_bits());
    let thresholds: Vec<f64> = back.partial_exits.iter().map(|e| e.threshold).collect();
    assert_eq!(thresholds, vec![1.3, 2.7]);
}

#[test]
fn file_is_capped_oldest_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("closed.json");
    let m = PositionLifecycleManager::new(config_with_history(&path, 2)).unwrap();
    for id in ["a", "b", "c"] {
        run_one(&m, id);
    }
    let ids: Vec<String> = JsonHistoryStore::new(&path)
        .load()
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["b", "c"]);
}

#[test]
fn new_manager_sees_existing_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("closed.json");
    {
        let m = PositionLifecycleManager::new(config_with_history(&path, 10)).unwrap();
        run_one(&m, "first");
    }
    let m = PositionLifecycleManager::new(config_with_history(&path, 10)).unwrap();
    assert_eq!(m.history().len(), 1);
    run_one(&m, "second");
    assert_eq!(JsonHistoryStore::new(&path).load().unwrap().len(), 2);
}
