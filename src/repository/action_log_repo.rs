// ==========================================
// 纵剪分条隔套配刀系统 - 操作日志数据仓储
// ==========================================
// 对齐: db::ensure_schema action_log 表
// 红线: 所有库存写入必须记录
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
