// ==========================================
// 纵剪分条隔套配刀系统 - 隔套配刀 API
// ==========================================
// 职责:
// 1. 配刀计算（扣减库存并持久化）与试算
// 2. 库存查询、编辑、重置、导入/导出
// 3. 作业保存/加载
// 红线: 所有库存写入必须记录 ActionLog
// ==========================================

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::allocation::AllocationReport;
use crate::domain::denomination::{round4, Denomination};
use crate::domain::inventory::{InventoryLedger, InventorySnapshot};
use crate::domain::job::{suggested_clearance, JobRun};
use crate::domain::types::SpacerMaterial;
use crate::engine::allocation::AllocationPipeline;
use crate::engine::ledger::SharedLedger;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::inventory_repo::InventoryRepository;
use crate::repository::job_repo::{JobRecord, JobRepository};

/// 配刀计算结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationResponse {
    pub job_id: String,
    pub report: AllocationReport,
}

// ==========================================
// SpacerApi - 隔套配刀 API
// ==========================================
pub struct SpacerApi {
    ledger: SharedLedger,
    pipeline: AllocationPipeline,
    inventory_repo: Arc<InventoryRepository>,
    job_repo: Arc<JobRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
    // 串行化"取台账副本 + 整体写库", 保证库中总是较新的状态
    persist_lock: Mutex<()>,
}

impl SpacerApi {
    pub fn new(
        ledger: SharedLedger,
        pipeline: AllocationPipeline,
        inventory_repo: Arc<InventoryRepository>,
        job_repo: Arc<JobRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            ledger,
            pipeline,
            inventory_repo,
            job_repo,
            action_log_repo,
            config_manager,
            persist_lock: Mutex::new(()),
        }
    }

    /// 共享台账句柄
    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    // ==========================================
    // 配刀计算
    // ==========================================

    /// 配刀计算: 分配、扣减库存、保存作业并记录日志
    ///
    /// # 返回
    /// - Ok(CalculationResponse): 作业ID + 报告
    /// - Err(ApiError::Allocation): 分配失败, 库存未变化
    #[instrument(skip(self, job), fields(customer = ?job.customer))]
    pub fn calculate(&self, job: &JobRun, operator: &str) -> ApiResult<CalculationResponse> {
        let report = self.pipeline.run(job, &self.ledger)?;

        if let Err(e) = self.persist_inventory() {
            // 库存写库失败时撤销内存扣减, 保持内存与库一致
            warn!(error = %e, "库存持久化失败, 撤销本次扣减");
            for assignment in report.assignments.iter().rev() {
                if let Err(release_err) = self.ledger.release(&assignment.combo) {
                    warn!(error = %release_err, "归还组合失败");
                }
            }
            return Err(e);
        }

        let mut record = JobRecord::new(job.clone()).with_report(report.clone());
        match self.config_manager.get_config_snapshot() {
            Ok(snapshot) => record = record.with_config_snapshot(snapshot),
            Err(e) => warn!(error = %e, "读取配置快照失败"),
        }
        let job_id = self.job_repo.save(&record)?;

        let log = ActionLog::new(ActionType::Calculate, operator)
            .with_job_id(&job_id)
            .with_payload(&serde_json::json!({
                "run_id": report.run_id,
                "cuts": job.total_cut_count(),
                "units": report.usage.total_units(),
                "usage": report.usage,
                "scrap": report.scrap,
            }))
            .with_detail(format!(
                "配刀 {} 刀, 使用隔套 {} 块",
                job.total_cut_count(),
                report.usage.total_units()
            ));
        self.record_action(&log);

        info!(job_id = %job_id, run_id = %report.run_id, "配刀计算已保存");
        Ok(CalculationResponse { job_id, report })
    }

    /// 解析作业 JSON（`cuts` 可为数组或清单文本）
    ///
    /// # 返回
    /// - Err(ApiError::Allocation(InvalidCutSpecification)): 清单文本格式错误
    /// - Err(ApiError::ValidationError): JSON 本身无法解析
    pub fn parse_job_json(&self, raw: &str) -> ApiResult<JobRun> {
        Ok(JobRun::from_json_str(raw)?)
    }

    /// 试算: 基于当前库存快照, 不扣减、不写库
    pub fn preview(&self, job: &JobRun) -> ApiResult<AllocationReport> {
        let snapshot = self.ledger.snapshot()?;
        Ok(self.pipeline.preview(job, &snapshot)?)
    }

    /// 建议间隙（4 位小数）
    pub fn suggested_clearance(&self, thickness_in: f64, clearance_pct: f64) -> ApiResult<f64> {
        if !thickness_in.is_finite() || thickness_in <= 0.0 {
            return Err(ApiError::InvalidInput(format!("料厚必须为正数: {}", thickness_in)));
        }
        if !clearance_pct.is_finite() || clearance_pct < 0.0 {
            return Err(ApiError::InvalidInput(format!("间隙百分比不能为负数: {}", clearance_pct)));
        }
        Ok(round4(suggested_clearance(thickness_in, clearance_pct)))
    }

    // ==========================================
    // 库存
    // ==========================================

    pub fn get_inventory(&self) -> ApiResult<InventorySnapshot> {
        Ok(self.ledger.snapshot()?)
    }

    /// 修改单个规格块数
    pub fn update_inventory_count(
        &self,
        material: SpacerMaterial,
        denomination: &str,
        count: u32,
        operator: &str,
    ) -> ApiResult<InventorySnapshot> {
        let denomination: Denomination = denomination
            .parse()
            .map_err(|e| ApiError::InvalidInput(format!("{}", e)))?;

        let before = {
            let _guard = self.lock_persist()?;
            let before = self.ledger.with_ledger(|l| {
                let before = l.available(material, denomination);
                l.set_count(material, denomination, count);
                before
            })?;
            self.inventory_repo.update_count(material, denomination, count)?;
            before
        };

        let log = ActionLog::new(ActionType::EditInventory, operator)
            .with_payload(&serde_json::json!({
                "material": material,
                "denomination": denomination,
                "before": before,
                "after": count,
            }))
            .with_detail(format!("{} {}\": {} -> {}", material, denomination, before, count));
        self.record_action(&log);

        self.get_inventory()
    }

    /// 恢复车间出厂库存
    pub fn reset_inventory(&self, operator: &str) -> ApiResult<InventorySnapshot> {
        let defaults = InventoryLedger::shop_default().snapshot();
        self.replace_inventory(&defaults)?;

        let log = ActionLog::new(ActionType::ResetInventory, operator)
            .with_detail(format!("恢复出厂库存, 共 {} 块", defaults.total_units()));
        self.record_action(&log);

        self.get_inventory()
    }

    /// 导出库存 JSON ({ "metal": {...}, "plastic": {...} })
    pub fn export_inventory_json(&self) -> ApiResult<String> {
        let snapshot = self.ledger.snapshot()?;
        serde_json::to_string_pretty(&snapshot).map_err(|e| ApiError::InternalError(e.to_string()))
    }

    /// 导入库存 JSON, 整体覆盖当前库存
    pub fn import_inventory_json(&self, json: &str, operator: &str) -> ApiResult<InventorySnapshot> {
        let snapshot: InventorySnapshot = serde_json::from_str(json)
            .map_err(|e| ApiError::ValidationError(format!("库存 JSON 格式错误: {}", e)))?;
        self.replace_inventory(&snapshot)?;

        let log = ActionLog::new(ActionType::ImportInventory, operator)
            .with_payload(&snapshot)
            .with_detail(format!("导入库存, 共 {} 块", snapshot.total_units()));
        self.record_action(&log);

        self.get_inventory()
    }

    fn replace_inventory(&self, snapshot: &InventorySnapshot) -> ApiResult<()> {
        self.ledger.with_ledger(|l| l.restore(snapshot))?;
        self.persist_inventory()
    }

    fn lock_persist(&self) -> ApiResult<std::sync::MutexGuard<'_, ()>> {
        self.persist_lock
            .lock()
            .map_err(|e| ApiError::InternalError(format!("锁获取失败: {}", e)))
    }

    fn persist_inventory(&self) -> ApiResult<()> {
        let _guard = self.lock_persist()?;
        let ledger = self.ledger.to_ledger()?;
        self.inventory_repo.save(&ledger)?;
        Ok(())
    }

    // ==========================================
    // 作业
    // ==========================================

    /// 保存作业参数（不计算）
    pub fn save_job(&self, job: &JobRun, operator: &str) -> ApiResult<String> {
        let job_id = self.job_repo.save(&JobRecord::new(job.clone()))?;
        let log = ActionLog::new(ActionType::SaveJob, operator)
            .with_job_id(&job_id)
            .with_payload(job);
        self.record_action(&log);
        Ok(job_id)
    }

    pub fn load_job(&self, job_id: &str) -> ApiResult<JobRecord> {
        self.job_repo
            .find_by_id(job_id)?
            .ok_or_else(|| ApiError::NotFound(format!("作业(id={})不存在", job_id)))
    }

    /// 最近一次保存的作业
    pub fn load_last_job(&self) -> ApiResult<Option<JobRecord>> {
        Ok(self.job_repo.find_latest()?)
    }

    pub fn recent_actions(&self, limit: i32) -> ApiResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.find_recent(limit)?)
    }

    // 日志写入失败只告警, 不影响主要操作
    fn record_action(&self, log: &ActionLog) {
        if let Err(e) = self.action_log_repo.insert(log) {
            warn!(error = %e, action_type = %log.action_type, "记录操作日志失败");
        }
    }
}
