// ==========================================
// 纵剪分条隔套配刀系统 - 隔套分配流水线
// ==========================================
// 职责: 编排一次作业的全部隔套分配
// 流程:
//   1. 肩部隔套: 目标 = 间隙 + 母刀厚度, 优先金属, 记入下轴
//   2. 逐刀位: 母刀隔套目标 = 分条宽度 (作业公差)
//             公刀隔套目标 = 母刀实际值 + 挠曲补偿 - (母刀 + 公刀 + 2 × 间隙)
//   3. 奇数刀位母刀在上轴, 偶数刀位相反
//   4. 废边 = 卷宽 - Σ(宽度 × 数量)
// 红线: 逐阶段提交库存; 任一阶段失败, 本次已提交的组合全部归还
// ==========================================

use crate::config::allocation_config_trait::AllocationConfig;
use crate::domain::allocation::{AllocationReport, StackAssignment, StripWeight, UsageTally};
use crate::domain::combo::Combo;
use crate::domain::denomination::{round4, ToleranceBand};
use crate::domain::inventory::{InventoryLedger, InventorySnapshot};
use crate::domain::job::JobRun;
use crate::domain::types::{AllocationStage, KnifeLine, SpacerMaterial};
use crate::engine::combo_finder::{ComboFinder, FindOutcome};
use crate::engine::deflection::DeflectionModel;
use crate::engine::error::{AllocationError, AllocationResult};
use crate::engine::ledger::SharedLedger;
use tracing::{debug, info, instrument, warn};

// 单个阶段的搜索请求
struct StageRequest {
    stage: AllocationStage,
    target_index: usize,
    target: f64,
    band: ToleranceBand,
    prefer: Option<SpacerMaterial>,
}

// ==========================================
// AllocationPipeline - 分配流水线
// ==========================================
#[derive(Debug, Clone)]
pub struct AllocationPipeline {
    finder: ComboFinder,
    deflection: DeflectionModel,
    shoulder_band: ToleranceBand,
    male_band: ToleranceBand,
    commit_retry_limit: u32,
}

impl AllocationPipeline {
    pub fn new() -> Self {
        Self::from_config(&AllocationConfig::default())
    }

    pub fn from_config(config: &AllocationConfig) -> Self {
        Self {
            finder: ComboFinder::new(config.max_stack_depth, config.candidate_budget),
            deflection: DeflectionModel::new(),
            shoulder_band: ToleranceBand::symmetric(config.shoulder_tolerance),
            male_band: ToleranceBand::symmetric(config.male_tolerance),
            commit_retry_limit: config.commit_retry_limit,
        }
    }

    pub fn finder(&self) -> &ComboFinder {
        &self.finder
    }

    /// 执行一次作业分配并扣减共享台账
    ///
    /// # 返回
    /// - Ok(report): 所有阶段均已提交
    /// - Err: 台账恢复到本次调用前的块数
    #[instrument(skip(self, job, ledger), fields(cuts = job.total_cut_count()))]
    pub fn run(&self, job: &JobRun, ledger: &SharedLedger) -> AllocationResult<AllocationReport> {
        job.validate()?;

        let mut committed: Vec<Combo> = Vec::new();
        match self.allocate(job, ledger, &mut committed) {
            Ok(report) => {
                info!(
                    run_id = %report.run_id,
                    stacks = report.assignments.len(),
                    units = report.usage.total_units(),
                    scrap = report.scrap,
                    "隔套分配完成"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(error = %err, rollback = committed.len(), "隔套分配失败, 归还已提交组合");
                for combo in committed.iter().rev() {
                    if let Err(e) = ledger.release(combo) {
                        warn!(error = %e, "归还组合失败");
                    }
                }
                Err(err)
            }
        }
    }

    /// 试算: 在快照副本上运行, 不影响任何共享台账
    pub fn preview(
        &self,
        job: &JobRun,
        snapshot: &InventorySnapshot,
    ) -> AllocationResult<AllocationReport> {
        let scratch = SharedLedger::new(InventoryLedger::from_snapshot(snapshot));
        self.run(job, &scratch)
    }

    fn allocate(
        &self,
        job: &JobRun,
        ledger: &SharedLedger,
        committed: &mut Vec<Combo>,
    ) -> AllocationResult<AllocationReport> {
        let clearance = job.clearance();
        let deflection = self
            .deflection
            .offset(job.material, job.thickness_in, job.auto_deflect);
        let cut_prefer = if job.minimize_shims {
            Some(SpacerMaterial::Metal)
        } else {
            None
        };
        let knife_gap = job.female_knife + job.male_knife + 2.0 * clearance;

        debug!(clearance, deflection, knife_gap, "作业参数");

        let mut assignments = Vec::new();
        let mut usage = UsageTally::new();

        // === 肩部隔套 ===
        let shoulder_target = clearance + job.female_knife;
        let combo = self.commit_stage(
            ledger,
            committed,
            StageRequest {
                stage: AllocationStage::Shoulder,
                target_index: 0,
                target: shoulder_target,
                band: self.shoulder_band,
                prefer: Some(SpacerMaterial::Metal),
            },
        )?;
        usage.add(&combo);
        assignments.push(StackAssignment {
            stage: AllocationStage::Shoulder,
            cut_position: None,
            line: KnifeLine::Bottom,
            target: shoulder_target,
            achieved: combo.sum_inches(),
            deflection_offset: 0.0,
            combo,
        });

        // === 逐刀位 ===
        for cut in job.expand_cuts() {
            let female = self.commit_stage(
                ledger,
                committed,
                StageRequest {
                    stage: AllocationStage::Female,
                    target_index: cut.position,
                    target: cut.width,
                    band: job.width_band(),
                    prefer: cut_prefer,
                },
            )?;
            let female_actual = female.sum_inches() + deflection;
            let male_target = female_actual - knife_gap;

            let male = self.commit_stage(
                ledger,
                committed,
                StageRequest {
                    stage: AllocationStage::Male,
                    target_index: cut.position,
                    target: male_target,
                    band: self.male_band,
                    prefer: cut_prefer,
                },
            )?;

            usage.add(&female);
            usage.add(&male);
            assignments.push(StackAssignment {
                stage: AllocationStage::Female,
                cut_position: Some(cut.position),
                line: cut.female_line(),
                target: cut.width,
                achieved: female.sum_inches(),
                deflection_offset: deflection,
                combo: female,
            });
            assignments.push(StackAssignment {
                stage: AllocationStage::Male,
                cut_position: Some(cut.position),
                line: cut.male_line(),
                target: male_target,
                achieved: male.sum_inches(),
                deflection_offset: 0.0,
                combo: male,
            });
        }

        // === 废边与重量 ===
        let (scrap, strip_weights, scrap_weight) = scrap_and_weights(job);

        Ok(AllocationReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            calculated_at: chrono::Utc::now().naive_utc(),
            assignments,
            usage,
            clearance,
            deflection_offset: deflection,
            scrap,
            strip_weights,
            scrap_weight,
        })
    }

    // 搜索 + 预留; 预留被其他作业抢先时重新快照再搜索
    fn commit_stage(
        &self,
        ledger: &SharedLedger,
        committed: &mut Vec<Combo>,
        request: StageRequest,
    ) -> AllocationResult<Combo> {
        self.commit_stage_with(ledger, committed, request, |_, _| {})
    }

    // before_reserve 在"快照搜索"与"锁内预留"之间调用, 即其他作业可能插入的位置
    fn commit_stage_with(
        &self,
        ledger: &SharedLedger,
        committed: &mut Vec<Combo>,
        request: StageRequest,
        mut before_reserve: impl FnMut(&SharedLedger, &Combo),
    ) -> AllocationResult<Combo> {
        let mut attempts = 0u32;
        loop {
            let snapshot = ledger.snapshot()?;
            let combo = match self
                .finder
                .find(request.target, request.band, &snapshot, request.prefer)
            {
                FindOutcome::Found(combo) => combo,
                FindOutcome::NotFound => return Err(stage_failed(&request, false)),
                FindOutcome::BudgetExhausted { visited } => {
                    warn!(
                        stage = %request.stage,
                        target_index = request.target_index,
                        visited,
                        "组合搜索超出预算"
                    );
                    return Err(stage_failed(&request, true));
                }
            };

            before_reserve(ledger, &combo);
            match ledger.try_reserve(&combo)? {
                Ok(()) => {
                    debug!(
                        stage = %request.stage,
                        target_index = request.target_index,
                        target = request.target,
                        combo = %combo,
                        "阶段已提交"
                    );
                    committed.push(combo.clone());
                    return Ok(combo);
                }
                Err(e) => {
                    attempts += 1;
                    warn!(
                        stage = %request.stage,
                        target_index = request.target_index,
                        attempts,
                        error = %e,
                        "提交时库存已变化, 重新搜索"
                    );
                    if attempts > self.commit_retry_limit {
                        return Err(AllocationError::InsufficientLedgerCapacityOnCommit {
                            stage: request.stage,
                            target_index: request.target_index,
                            attempts,
                        });
                    }
                }
            }
        }
    }
}

impl Default for AllocationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn stage_failed(request: &StageRequest, budget_exhausted: bool) -> AllocationError {
    AllocationError::StageAllocationFailed {
        stage: request.stage,
        target_index: request.target_index,
        target: request.target,
        tolerance: request.band,
        budget_exhausted,
    }
}

// 废边（4 位小数）以及可选的分条重量/废边重量
fn scrap_and_weights(job: &JobRun) -> (f64, Vec<StripWeight>, Option<f64>) {
    let coil_width = match job.effective_coil_width() {
        Some(w) => w,
        None => return (0.0, Vec::new(), None),
    };
    let scrap = round4(coil_width - job.total_cut_width());

    match job.effective_coil_weight() {
        Some(coil_weight) => {
            let strips = job
                .cuts
                .iter()
                .map(|c| StripWeight {
                    width: c.width,
                    count: c.count,
                    weight_each: coil_weight * c.width / coil_width,
                })
                .collect();
            (scrap, strips, Some(coil_weight * scrap / coil_width))
        }
        None => (scrap, Vec::new(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::denomination::Denomination;
    use crate::domain::inventory::SpacerPool;
    use crate::domain::job::CutRequest;
    use crate::domain::types::CoilMaterial;

    fn d(v: f64) -> Denomination {
        Denomination::from_inches(v).unwrap()
    }

    fn job(cuts: Vec<CutRequest>) -> JobRun {
        JobRun {
            customer: None,
            cuts,
            thickness_in: 0.020,
            clearance_pct: 10.0,
            female_knife: 0.25,
            male_knife: 0.25,
            coil_width: Some(6.0),
            coil_weight: None,
            tol_plus: 0.005,
            tol_minus: 0.005,
            material: CoilMaterial::Aluminum,
            auto_deflect: true,
            minimize_shims: true,
        }
    }

    #[test]
    fn test_single_cut_scrap() {
        let ledger = SharedLedger::new(InventoryLedger::shop_default());
        let report = AllocationPipeline::new()
            .run(&job(vec![CutRequest { width: 0.745, count: 1 }]), &ledger)
            .unwrap();

        assert_eq!(report.scrap, 5.255);
        assert_eq!(report.assignments.len(), 3);

        let shoulder = report.shoulder().unwrap();
        assert_eq!(shoulder.line, KnifeLine::Bottom);
        assert!(ToleranceBand::symmetric(0.001).contains(0.252, shoulder.combo.sum_units()));

        let (female, male) = report.cut(1).unwrap();
        assert_eq!(female.line, KnifeLine::Top);
        assert_eq!(male.line, KnifeLine::Bottom);
        assert!(ToleranceBand::symmetric(0.005).contains(0.745, female.combo.sum_units()));
        assert_eq!(female.deflection_offset, 0.0005);

        // 公刀目标由母刀实际值推导
        let expected_male = female.achieved + 0.0005 - (0.25 + 0.25 + 2.0 * 0.002);
        assert!((male.target - expected_male).abs() < 1e-9);
        assert!(ToleranceBand::symmetric(0.001).contains(male.target, male.combo.sum_units()));
    }

    #[test]
    fn test_parity_alternates_lines() {
        let ledger = SharedLedger::new(InventoryLedger::shop_default());
        let report = AllocationPipeline::new()
            .run(&job(vec![CutRequest { width: 1.0, count: 3 }]), &ledger)
            .unwrap();

        for position in 1..=3 {
            let (female, male) = report.cut(position).unwrap();
            let expected = if position % 2 == 1 { KnifeLine::Top } else { KnifeLine::Bottom };
            assert_eq!(female.line, expected);
            assert_eq!(male.line, expected.opposite());
        }
        // 上轴: 刀 1 母刀, 刀 2 公刀, 刀 3 母刀
        let top = report.line(KnifeLine::Top);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].stage, AllocationStage::Female);
        assert_eq!(top[1].stage, AllocationStage::Male);
    }

    #[test]
    fn test_usage_matches_ledger_decrement() {
        let before = InventoryLedger::shop_default();
        let ledger = SharedLedger::new(before.clone());
        let report = AllocationPipeline::new()
            .run(&job(vec![CutRequest { width: 1.5, count: 2 }]), &ledger)
            .unwrap();

        let after = ledger.to_ledger().unwrap();
        for entry in report.usage.entries() {
            assert_eq!(
                before.available(entry.material, entry.denomination)
                    - after.available(entry.material, entry.denomination),
                entry.count
            );
        }
        assert_eq!(before.total_units() - after.total_units(), report.usage.total_units() as u64);
    }

    #[test]
    fn test_failure_rolls_back_whole_run() {
        // 只够肩部与第一个母刀, 公刀无解
        let mut metal = SpacerPool::new();
        metal.insert(d(0.25), 1);
        metal.insert(d(0.002), 1);
        metal.insert(d(0.5), 1);
        let ledger = SharedLedger::new(InventoryLedger::from_pools(metal, SpacerPool::new()));
        let before = ledger.snapshot().unwrap();

        let err = AllocationPipeline::new()
            .run(&job(vec![CutRequest { width: 0.5, count: 1 }]), &ledger)
            .unwrap_err();

        assert!(matches!(
            err,
            AllocationError::StageAllocationFailed { stage: AllocationStage::Male, target_index: 1, .. }
        ));
        let after = ledger.snapshot().unwrap();
        assert_eq!(after.metal, before.metal);
        assert_eq!(after.plastic, before.plastic);
    }

    #[test]
    fn test_shoulder_failure_is_stage_tagged() {
        let ledger = SharedLedger::new(InventoryLedger::new());
        let err = AllocationPipeline::new()
            .run(&job(vec![CutRequest { width: 1.0, count: 1 }]), &ledger)
            .unwrap_err();
        assert_eq!(err.stage(), Some(AllocationStage::Shoulder));
    }

    #[test]
    fn test_invalid_job_rejected_before_search() {
        let ledger = SharedLedger::new(InventoryLedger::shop_default());
        let mut bad = job(vec![CutRequest { width: 1.0, count: 1 }]);
        bad.male_knife = 0.0;
        let err = AllocationPipeline::new().run(&bad, &ledger).unwrap_err();
        assert!(matches!(err, AllocationError::InvalidJobParameter(_)));
        assert_eq!(ledger.to_ledger().unwrap().revision(), 0);
    }

    #[test]
    fn test_preview_leaves_snapshot_source_untouched() {
        let ledger = SharedLedger::new(InventoryLedger::shop_default());
        let snapshot = ledger.snapshot().unwrap();
        let report = AllocationPipeline::new()
            .preview(&job(vec![CutRequest { width: 2.0, count: 1 }]), &snapshot)
            .unwrap();
        assert!(report.usage.total_units() > 0);
        assert_eq!(ledger.snapshot().unwrap(), snapshot);
    }

    #[test]
    fn test_strip_and_scrap_weights() {
        let ledger = SharedLedger::new(InventoryLedger::shop_default());
        let mut j = job(vec![CutRequest { width: 1.5, count: 2 }]);
        j.coil_weight = Some(1200.0);
        let report = AllocationPipeline::new().run(&j, &ledger).unwrap();

        assert_eq!(report.scrap, 3.0);
        assert_eq!(report.strip_weights.len(), 1);
        assert!((report.strip_weights[0].weight_each - 300.0).abs() < 1e-9);
        assert!((report.scrap_weight.unwrap() - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_oversized_cut_count_rejected_before_search() {
        let ledger = SharedLedger::new(InventoryLedger::shop_default());
        let huge = job(vec![CutRequest { width: 1.0, count: 4_000_000_000 }]);
        let err = AllocationPipeline::new().run(&huge, &ledger).unwrap_err();
        assert!(matches!(err, AllocationError::InvalidJobParameter(ref e) if e.field == "cuts"));
        assert_eq!(ledger.to_ledger().unwrap().revision(), 0);
    }

    #[test]
    fn test_long_cut_list_fails_where_inventory_runs_out() {
        let ledger = SharedLedger::new(InventoryLedger::shop_default());
        let before = ledger.snapshot().unwrap();

        let err = AllocationPipeline::new()
            .run(&job(vec![CutRequest { width: 1.0, count: 1_000 }]), &ledger)
            .unwrap_err();
        match err {
            AllocationError::StageAllocationFailed { target_index, .. } => assert!(target_index > 1),
            other => panic!("unexpected error: {other}"),
        }

        let after = ledger.snapshot().unwrap();
        assert_eq!(after.metal, before.metal);
        assert_eq!(after.plastic, before.plastic);
    }

    fn female_request(target: f64) -> StageRequest {
        StageRequest {
            stage: AllocationStage::Female,
            target_index: 3,
            target,
            band: ToleranceBand::new(0.0, 0.0),
            prefer: Some(SpacerMaterial::Metal),
        }
    }

    // 模拟另一作业在搜索后、预留前抢走组合中的全部规格
    fn drain(ledger: &SharedLedger, combo: &Combo) {
        ledger
            .with_ledger(|l| {
                for piece in combo.pieces() {
                    l.set_count(piece.material, piece.denomination, 0);
                }
            })
            .unwrap();
    }

    #[test]
    fn test_commit_retry_searches_again_on_fresh_snapshot() {
        let mut metal = SpacerPool::new();
        metal.insert(d(0.5), 1);
        metal.insert(d(0.25), 2);
        let ledger = SharedLedger::new(InventoryLedger::from_pools(metal, SpacerPool::new()));
        let pipeline = AllocationPipeline::new();

        let mut calls = 0;
        let mut committed = Vec::new();
        let combo = pipeline
            .commit_stage_with(&ledger, &mut committed, female_request(0.5), |l, c| {
                calls += 1;
                if calls == 1 {
                    drain(l, c);
                }
            })
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(combo, Combo::of_material(SpacerMaterial::Metal, &[d(0.25), d(0.25)]));
        assert_eq!(committed, vec![combo]);
        assert_eq!(ledger.snapshot().unwrap().available(SpacerMaterial::Metal, d(0.25)), 0);
    }

    #[test]
    fn test_commit_gives_up_after_retry_limit() {
        let mut metal = SpacerPool::new();
        metal.insert(d(0.5), 1);
        metal.insert(d(0.25), 2);
        metal.insert(d(0.125), 4);
        let ledger = SharedLedger::new(InventoryLedger::from_pools(metal, SpacerPool::new()));
        let pipeline = AllocationPipeline::from_config(&AllocationConfig {
            commit_retry_limit: 2,
            ..AllocationConfig::default()
        });

        let mut committed = Vec::new();
        let err = pipeline
            .commit_stage_with(&ledger, &mut committed, female_request(0.5), drain)
            .unwrap_err();

        assert_eq!(
            err,
            AllocationError::InsufficientLedgerCapacityOnCommit {
                stage: AllocationStage::Female,
                target_index: 3,
                attempts: 3,
            }
        );
        assert!(committed.is_empty());
    }

    #[test]
    fn test_no_retry_when_limit_is_zero() {
        let mut metal = SpacerPool::new();
        metal.insert(d(0.5), 1);
        metal.insert(d(0.25), 2);
        let ledger = SharedLedger::new(InventoryLedger::from_pools(metal, SpacerPool::new()));
        let pipeline = AllocationPipeline::from_config(&AllocationConfig {
            commit_retry_limit: 0,
            ..AllocationConfig::default()
        });

        let err = pipeline
            .commit_stage_with(&ledger, &mut Vec::new(), female_request(0.5), drain)
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::InsufficientLedgerCapacityOnCommit { attempts: 1, .. }
        ));
    }

    #[test]
    fn test_no_coil_width_means_zero_scrap() {
        let ledger = SharedLedger::new(InventoryLedger::shop_default());
        let mut j = job(vec![CutRequest { width: 1.0, count: 1 }]);
        j.coil_width = None;
        let report = AllocationPipeline::new().run(&j, &ledger).unwrap();
        assert_eq!(report.scrap, 0.0);
        assert!(report.scrap_weight.is_none());
    }
}
