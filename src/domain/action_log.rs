// ==========================================
// 纵剪分条隔套配刀系统 - 操作日志领域模型
// ==========================================
// 红线: 所有库存写入必须记录
// 用途: 审计追踪 (谁在何时扣减/编辑/重置了库存)
// 对齐: db::ensure_schema action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,        // 日志ID (UUID)
    pub action_type: String,      // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime, // 操作时间戳
    pub actor: String,            // 操作人

    pub job_id: Option<String>,          // 关联作业 (库存编辑等操作为 None)
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Calculate,       // 配刀计算并扣减库存
    EditInventory,   // 手工修改某规格块数
    ResetInventory,  // 恢复车间出厂库存
    ImportInventory, // 导入库存 JSON
    SaveJob,         // 保存作业
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Calculate => "Calculate",
            ActionType::EditInventory => "EditInventory",
            ActionType::ResetInventory => "ResetInventory",
            ActionType::ImportInventory => "ImportInventory",
            ActionType::SaveJob => "SaveJob",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Calculate" => Some(ActionType::Calculate),
            "EditInventory" => Some(ActionType::EditInventory),
            "ResetInventory" => Some(ActionType::ResetInventory),
            "ImportInventory" => Some(ActionType::ImportInventory),
            "SaveJob" => Some(ActionType::SaveJob),
            _ => None,
        }
    }
}

impl ActionLog {
    /// 创建新的操作日志（时间戳取当前 UTC）
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
            job_id: None,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_job_id(mut self, job_id: &str) -> Self {
        self.job_id = Some(job_id.to_string());
        self
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> Option<ActionType> {
        ActionType::parse(&self.action_type)
    }
}
