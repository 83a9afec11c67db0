// ==========================================
// 纵剪分条隔套配刀系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入、快照
// 存储: config_kv 表 (key-value + scope), 当前只使用 scope_id='global'
// ==========================================

use crate::config::allocation_config_trait::{
    AllocationConfigReader, DEFAULT_COMMIT_RETRY_LIMIT, DEFAULT_STACK_TOLERANCE,
};
use crate::db::open_sqlite_connection;
use crate::domain::combo::DEFAULT_MAX_STACK_DEPTH;
use crate::engine::combo_finder::DEFAULT_CANDIDATE_BUDGET;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 读取并解析数值配置; 缺失或格式错误时使用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(
                        config_key = key,
                        raw_value = %raw,
                        default = %default,
                        "配置格式错误，使用默认值"
                    );
                    Ok(default)
                }
            },
        }
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 随作业记录保存, 便于复现当时的引擎参数
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖现有的global配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute("BEGIN TRANSACTION", [])?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            let affected = conn.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            );
            match affected {
                Ok(n) => count += n,
                Err(e) => {
                    let _ = conn.execute("ROLLBACK", []);
                    return Err(Box::new(e));
                }
            }
        }

        conn.execute("COMMIT", [])?;

        Ok(count)
    }
}

// ==========================================
// AllocationConfigReader Trait 实现
// ==========================================
impl AllocationConfigReader for ConfigManager {
    fn get_max_stack_depth(&self) -> Result<usize, Box<dyn Error>> {
        let depth = self.get_parsed_or_default(config_keys::MAX_STACK_DEPTH, DEFAULT_MAX_STACK_DEPTH)?;
        // 0 层无意义, 回退默认值
        Ok(if depth == 0 { DEFAULT_MAX_STACK_DEPTH } else { depth })
    }

    fn get_candidate_budget(&self) -> Result<u64, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::COMBO_CANDIDATE_BUDGET, DEFAULT_CANDIDATE_BUDGET)
    }

    fn get_shoulder_tolerance(&self) -> Result<f64, Box<dyn Error>> {
        let v = self.get_parsed_or_default(config_keys::SHOULDER_TOLERANCE, DEFAULT_STACK_TOLERANCE)?;
        Ok(if v.is_finite() && v >= 0.0 { v } else { DEFAULT_STACK_TOLERANCE })
    }

    fn get_male_tolerance(&self) -> Result<f64, Box<dyn Error>> {
        let v = self.get_parsed_or_default(config_keys::MALE_TOLERANCE, DEFAULT_STACK_TOLERANCE)?;
        Ok(if v.is_finite() && v >= 0.0 { v } else { DEFAULT_STACK_TOLERANCE })
    }

    fn get_commit_retry_limit(&self) -> Result<u32, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::COMMIT_RETRY_LIMIT, DEFAULT_COMMIT_RETRY_LIMIT)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // ===== 组合搜索 =====
    pub const MAX_STACK_DEPTH: &str = "max_stack_depth";
    pub const COMBO_CANDIDATE_BUDGET: &str = "combo_candidate_budget";

    // ===== 公差 =====
    pub const SHOULDER_TOLERANCE: &str = "shoulder_tolerance";
    pub const MALE_TOLERANCE: &str = "male_tolerance";

    // ===== 并发提交 =====
    pub const COMMIT_RETRY_LIMIT: &str = "commit_retry_limit";
}
