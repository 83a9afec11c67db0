// ==========================================
// 纵剪分条隔套配刀系统 - 应用层
// ==========================================
// 职责: 组装仓储、引擎与 API, 管理应用级共享状态
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
