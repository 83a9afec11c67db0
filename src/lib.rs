// ==========================================
// 纵剪分条隔套配刀系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 配刀辅助计算 (操作员最终确认上刀)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 组合搜索与分配
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AllocationStage, CoilMaterial, KnifeLine, SpacerMaterial};

// 领域实体
pub use domain::{
    ActionLog, ActionType, AllocationReport, Combo, Denomination, InventoryLedger,
    InventorySnapshot, JobRun, StackAssignment, ToleranceBand,
};

// 引擎
pub use engine::{
    AllocationError, AllocationPipeline, ComboFinder, DeflectionModel, FindOutcome, SharedLedger,
};

// API
pub use api::{ApiError, SpacerApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "纵剪分条隔套配刀系统";
