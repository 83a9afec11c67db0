// ==========================================
// 纵剪分条隔套配刀系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 分配失败必须带上阶段、刀位、目标值, 便于操作员定位
// ==========================================

use crate::domain::denomination::ToleranceBand;
use crate::domain::job::{CutSpecError, JobParameterError};
use crate::domain::types::AllocationStage;
use thiserror::Error;

/// 分配引擎错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    // ===== 输入错误 =====
    #[error("分条清单格式错误: {0}")]
    InvalidCutSpecification(#[from] CutSpecError),

    #[error("作业参数错误: {0}")]
    InvalidJobParameter(#[from] JobParameterError),

    // ===== 搜索失败 =====
    /// target_index: 刀位序号（肩部隔套为 0）
    #[error(
        "{stage} 隔套无可行组合: 刀位={target_index}, 目标={target:.4}, 公差={tolerance}{}{}",
        budget_note(.budget_exhausted),
        stage_hint(.stage)
    )]
    StageAllocationFailed {
        stage: AllocationStage,
        target_index: usize,
        target: f64,
        tolerance: ToleranceBand,
        budget_exhausted: bool,
    },

    // ===== 台账并发 =====
    #[error("提交时库存不足 (已重试 {attempts} 次): {stage} 刀位={target_index}")]
    InsufficientLedgerCapacityOnCommit {
        stage: AllocationStage,
        target_index: usize,
        attempts: u32,
    },

    #[error("库存台账不可用: {0}")]
    LedgerUnavailable(String),
}

impl AllocationError {
    /// 失败所在阶段（输入类错误为 None）
    pub fn stage(&self) -> Option<AllocationStage> {
        match self {
            AllocationError::StageAllocationFailed { stage, .. }
            | AllocationError::InsufficientLedgerCapacityOnCommit { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

fn budget_note(exhausted: &bool) -> &'static str {
    if *exhausted {
        " (搜索预算耗尽)"
    } else {
        ""
    }
}

// 公刀隔套目标由母刀实际值推导, 只能靠放宽公差或补充垫片解决
fn stage_hint(stage: &AllocationStage) -> &'static str {
    match stage {
        AllocationStage::Male => "; 请放宽公刀公差或补充垫片库存",
        _ => "",
    }
}

/// Result 类型别名
pub type AllocationResult<T> = Result<T, AllocationError>;
