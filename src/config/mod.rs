// ==========================================
// 纵剪分条隔套配刀系统 - 配置层
// ==========================================
// 职责: 分配引擎参数管理, 缺省时使用内置默认值
// 存储: config_kv 表
// ==========================================

pub mod allocation_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use allocation_config_trait::{AllocationConfig, AllocationConfigReader};
pub use config_manager::{config_keys, ConfigManager};
