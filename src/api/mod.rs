// ==========================================
// 纵剪分条隔套配刀系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供 CLI / 上层界面调用
// ==========================================

pub mod error;
pub mod spacer_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use spacer_api::{CalculationResponse, SpacerApi};
