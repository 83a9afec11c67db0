// ==========================================
// 纵剪分条隔套配刀系统 - 分配配置读取 Trait
// ==========================================
// 职责: 定义分配引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::combo::DEFAULT_MAX_STACK_DEPTH;
use crate::engine::combo_finder::DEFAULT_CANDIDATE_BUDGET;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// 肩部/公刀隔套的默认公差（英寸, 上下对称）
pub const DEFAULT_STACK_TOLERANCE: f64 = 0.001;

/// 提交失败后重新搜索的默认次数
pub const DEFAULT_COMMIT_RETRY_LIMIT: u32 = 3;

// ==========================================
// AllocationConfig - 分配引擎参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    pub max_stack_depth: usize,
    pub candidate_budget: u64,
    pub shoulder_tolerance: f64,
    pub male_tolerance: f64,
    pub commit_retry_limit: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            candidate_budget: DEFAULT_CANDIDATE_BUDGET,
            shoulder_tolerance: DEFAULT_STACK_TOLERANCE,
            male_tolerance: DEFAULT_STACK_TOLERANCE,
            commit_retry_limit: DEFAULT_COMMIT_RETRY_LIMIT,
        }
    }
}

// ==========================================
// AllocationConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait AllocationConfigReader: Send + Sync {
    /// 最大叠放层数
    ///
    /// # 默认值
    /// - 8
    fn get_max_stack_depth(&self) -> Result<usize, Box<dyn Error>>;

    /// 单次组合搜索的访问节点上限
    ///
    /// # 默认值
    /// - 2000000
    fn get_candidate_budget(&self) -> Result<u64, Box<dyn Error>>;

    /// 肩部隔套公差
    ///
    /// # 默认值
    /// - 0.001
    fn get_shoulder_tolerance(&self) -> Result<f64, Box<dyn Error>>;

    /// 公刀隔套公差
    ///
    /// # 默认值
    /// - 0.001
    fn get_male_tolerance(&self) -> Result<f64, Box<dyn Error>>;

    /// 提交时库存被抢占后的重试次数
    ///
    /// # 默认值
    /// - 3
    fn get_commit_retry_limit(&self) -> Result<u32, Box<dyn Error>>;

    /// 一次读取全部分配参数
    fn load_allocation_config(&self) -> Result<AllocationConfig, Box<dyn Error>> {
        Ok(AllocationConfig {
            max_stack_depth: self.get_max_stack_depth()?,
            candidate_budget: self.get_candidate_budget()?,
            shoulder_tolerance: self.get_shoulder_tolerance()?,
            male_tolerance: self.get_male_tolerance()?,
            commit_retry_limit: self.get_commit_retry_limit()?,
        })
    }
}
