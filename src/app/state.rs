// ==========================================
// 纵剪分条隔套配刀系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::SpacerApi;
use crate::config::{AllocationConfigReader, ConfigManager};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::engine::{AllocationPipeline, SharedLedger};
use crate::repository::{ActionLogRepository, InventoryRepository, JobRepository};

/// 应用状态
///
/// 所有仓储共享同一个 SQLite 连接; 库存台账常驻内存, 写操作后整体落库
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 隔套配刀API
    pub spacer_api: Arc<SpacerApi>,

    /// 配置管理器（读写 config_kv）
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// 1. 打开连接并建表
    /// 2. 读取库存（新库写入车间出厂库存）
    /// 3. 按 config_kv 构建分配流水线
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let inventory_repo = Arc::new(
            InventoryRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建InventoryRepository: {}", e))?,
        );
        let job_repo = Arc::new(
            JobRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建JobRepository: {}", e))?,
        );
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let config = config_manager
            .load_allocation_config()
            .map_err(|e| format!("读取分配配置失败: {}", e))?;
        tracing::debug!(?config, "分配配置已加载");
        let pipeline = AllocationPipeline::from_config(&config);

        let ledger = inventory_repo
            .load_or_seed()
            .map_err(|e| format!("读取库存失败: {}", e))?;
        tracing::info!(units = ledger.total_units(), "库存已加载");
        let ledger = SharedLedger::new(ledger);

        // ==========================================
        // 初始化API层
        // ==========================================
        let spacer_api = Arc::new(SpacerApi::new(
            ledger,
            pipeline,
            inventory_repo,
            job_repo,
            action_log_repo.clone(),
            config_manager.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            spacer_api,
            config_manager,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 SLITTER_SPACER_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("SLITTER_SPACER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./slitter_spacer.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("slitter-spacer-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("slitter-spacer");
        }

        std::fs::create_dir_all(&path).ok();
        path = path.join("slitter_spacer.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_app_state_seeds_inventory() {
        let temp = NamedTempFile::new().unwrap();
        let state = AppState::new(temp.path().to_str().unwrap().to_string()).unwrap();

        let snapshot = state.spacer_api.get_inventory().unwrap();
        assert_eq!(snapshot.metal.len(), 14);
        assert!(snapshot.total_units() > 0);
    }
}
