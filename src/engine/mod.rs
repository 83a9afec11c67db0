// ==========================================
// 纵剪分条隔套配刀系统 - 引擎层
// ==========================================
// 职责: 组合搜索、挠曲补偿、分配流水线
// 红线: Engine 不拼 SQL; 库存只通过 SharedLedger 修改
// ==========================================

pub mod allocation;
pub mod combo_finder;
pub mod deflection;
pub mod error;
pub mod ledger;

// 重导出核心引擎
pub use allocation::AllocationPipeline;
pub use combo_finder::{ComboFinder, FindOutcome, DEFAULT_CANDIDATE_BUDGET};
pub use deflection::DeflectionModel;
pub use error::{AllocationError, AllocationResult};
pub use ledger::SharedLedger;
