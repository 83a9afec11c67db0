// ==========================================
// 并发分配测试
// ==========================================
// 职责: 多个作业同时分配时, 共享台账不超扣、失败作业不留痕
// ==========================================

mod test_helpers;

use slitter_spacer::app::AppState;
use slitter_spacer::domain::{InventoryLedger, SpacerMaterial};
use slitter_spacer::engine::{AllocationPipeline, SharedLedger};
use std::sync::Arc;
use std::thread;
use test_helpers::{create_test_db, d, ledger, sample_job};

#[test]
fn test_concurrent_runs_never_oversubscribe() {
    // 肩部 0.252 只能用 0.25 + 0.002; 母刀 1.0 用 1.0; 公刀 0.4965 用 0.496
    let shared = SharedLedger::new(ledger(
        &[(1.0, 6), (0.496, 6), (0.25, 4), (0.002, 4)],
        &[],
    ));
    let pipeline = Arc::new(AllocationPipeline::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let shared = shared.clone();
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.run(&sample_job("1.0"), &shared).is_ok())
        })
        .collect();

    let succeeded = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    // 肩部只够 4 次
    assert_eq!(succeeded, 4);
    let after = shared.to_ledger().unwrap();
    assert_eq!(after.available(SpacerMaterial::Metal, d(0.25)), 0);
    assert_eq!(after.available(SpacerMaterial::Metal, d(0.002)), 0);
    assert_eq!(after.available(SpacerMaterial::Metal, d(1.0)), 2);
    assert_eq!(after.available(SpacerMaterial::Metal, d(0.496)), 2);
}

#[test]
fn test_concurrent_api_calculations_persist_final_state() {
    let (_temp, db_path) = create_test_db().expect("Failed to create test db");
    let state = Arc::new(AppState::new(db_path.clone()).expect("Failed to create AppState"));
    let before = InventoryLedger::shop_default().total_units();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                state
                    .spacer_api
                    .calculate(&sample_job("1.0x2"), &format!("worker-{}", i))
                    .map(|r| r.report.usage.total_units() as u64)
            })
        })
        .collect();

    let used: u64 = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .sum();

    let in_memory = state.spacer_api.get_inventory().unwrap();
    assert_eq!(before - in_memory.total_units(), used);

    let reopened = AppState::new(db_path).unwrap();
    assert_eq!(reopened.spacer_api.get_inventory().unwrap().metal, in_memory.metal);
}
