// ==========================================
// 纵剪分条隔套配刀系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑, 不含搜索/分配引擎逻辑
// ==========================================

pub mod action_log;
pub mod allocation;
pub mod combo;
pub mod denomination;
pub mod inventory;
pub mod job;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use allocation::{
    AllocationReport, StackAssignment, StackDescriptor, StripWeight, UsageEntry, UsageTally,
};
pub use combo::{Combo, ComboPiece, ComboPurity, DEFAULT_MAX_STACK_DEPTH};
pub use denomination::{round4, Denomination, DenominationError, ToleranceBand};
pub use inventory::{InventoryLedger, InventorySnapshot, ReserveError, SpacerPool};
pub use job::{
    parse_cut_list, suggested_clearance, CutRequest, CutSpec, CutSpecError, JobInputError,
    JobParameterError, JobRun, DEFAULT_WIDTH_TOLERANCE, MAX_TOTAL_CUTS,
};
pub use types::{AllocationStage, CoilMaterial, KnifeLine, SpacerMaterial};
