// ==========================================
// AllocationPipeline 集成测试
// ==========================================
// 测试目标: 整单分配的阶段顺序、公差、刀轴交替、库存一致性
// ==========================================

mod test_helpers;

use slitter_spacer::domain::{
    AllocationStage, CoilMaterial, InventoryLedger, KnifeLine, SpacerMaterial, ToleranceBand,
};
use slitter_spacer::engine::{AllocationError, AllocationPipeline, DeflectionModel, SharedLedger};
use test_helpers::{ledger, material_units, sample_job};

#[test]
fn test_single_cut_on_shop_inventory() {
    let mut job = sample_job("0.745");
    job.thickness_in = 0.015;
    job.clearance_pct = 16.7;

    let shared = SharedLedger::new(InventoryLedger::shop_default());
    let report = AllocationPipeline::new().run(&job, &shared).expect("三个阶段均应成功");

    assert_eq!(report.assignments.len(), 3);
    assert!((report.scrap - 5.255).abs() < 1e-9);

    let shoulder = report.shoulder().unwrap();
    assert_eq!(shoulder.line, KnifeLine::Bottom);
    let (lo, hi) = ToleranceBand::symmetric(0.001).window_units(shoulder.target);
    assert!(lo <= shoulder.combo.sum_units() && shoulder.combo.sum_units() <= hi);

    let (female, male) = report.cut(1).unwrap();
    assert_eq!(female.stage, AllocationStage::Female);
    assert_eq!(male.stage, AllocationStage::Male);
    let (lo, hi) = job.width_band().window_units(0.745);
    assert!(lo <= female.combo.sum_units() && female.combo.sum_units() <= hi);
    assert!((female.deflection_offset - 0.0005).abs() < 1e-12);
}

#[test]
fn test_knife_lines_alternate_by_position() {
    let job = sample_job("1.0x4");
    let shared = SharedLedger::new(InventoryLedger::shop_default());
    let report = AllocationPipeline::new().run(&job, &shared).unwrap();

    for position in 1..=4 {
        let (female, male) = report.cut(position).unwrap();
        let expected = if position % 2 == 1 { KnifeLine::Top } else { KnifeLine::Bottom };
        assert_eq!(female.line, expected, "position {}", position);
        assert_eq!(male.line, expected.opposite());
    }
}

#[test]
fn test_male_target_follows_female_actual() {
    let mut job = sample_job("1.5x2");
    job.material = CoilMaterial::Stainless;
    job.thickness_in = 0.04;

    let shared = SharedLedger::new(InventoryLedger::shop_default());
    let report = AllocationPipeline::new().run(&job, &shared).unwrap();

    let deflection = DeflectionModel::new().offset(CoilMaterial::Stainless, 0.04, true);
    assert!((deflection - 0.0015).abs() < 1e-12);

    let clearance = job.clearance();
    for position in 1..=2 {
        let (female, male) = report.cut(position).unwrap();
        let expected =
            female.combo.sum_inches() + deflection - (0.25 + 0.25 + 2.0 * clearance);
        assert!((male.target - expected).abs() < 1e-9);
    }
}

#[test]
fn test_usage_matches_inventory_decrement() {
    let job = sample_job("1.125x2, 0.745x3");
    let before = InventoryLedger::shop_default();
    let shared = SharedLedger::new(before.clone());

    let report = AllocationPipeline::new().run(&job, &shared).unwrap();
    let after = shared.to_ledger().unwrap();

    assert_eq!(before.total_units() - after.total_units(), report.usage.total_units() as u64);
    for entry in report.usage.entries() {
        assert_eq!(
            before.available(entry.material, entry.denomination)
                - after.available(entry.material, entry.denomination),
            entry.count
        );
    }
}

#[test]
fn test_failure_leaves_inventory_unchanged() {
    // 只有肩部能分配, 母刀隔套必然失败
    let before = ledger(&[(0.25, 1), (0.002, 1)], &[]);
    let shared = SharedLedger::new(before.clone());

    let err = AllocationPipeline::new().run(&sample_job("3.0"), &shared).unwrap_err();
    assert!(matches!(
        err,
        AllocationError::StageAllocationFailed { stage: AllocationStage::Female, target_index: 1, .. }
    ));

    let after = shared.to_ledger().unwrap();
    assert_eq!(after.snapshot().metal, before.snapshot().metal);
    assert_eq!(material_units(&after, SpacerMaterial::Metal), 2);
}

#[test]
fn test_disabled_deflection_has_no_offset() {
    let mut job = sample_job("0.745");
    job.auto_deflect = false;

    let shared = SharedLedger::new(InventoryLedger::shop_default());
    let report = AllocationPipeline::new().run(&job, &shared).unwrap();
    assert_eq!(report.deflection_offset, 0.0);
}
