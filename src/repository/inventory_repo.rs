// ==========================================
// 纵剪分条隔套配刀系统 - 隔套库存仓储
// ==========================================
// 职责: spacer_inventory 表 <-> InventoryLedger 的映射
// 红线: Repository 不做业务逻辑, 只做数据映射
// 存储: 每行一个 (材质, 规格), 规格以 4 位小数字符串存储
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::denomination::Denomination;
use crate::domain::inventory::{InventoryLedger, SpacerPool};
use crate::domain::types::SpacerMaterial;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub struct InventoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            ensure_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 读取库存; 表为空时返回 None
    pub fn load(&self) -> RepositoryResult<Option<InventoryLedger>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT material, denomination, count
            FROM spacer_inventory
            ORDER BY material, denomination
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut metal = SpacerPool::new();
        let mut plastic = SpacerPool::new();
        let mut any = false;
        for row in rows {
            let (material_raw, denomination_raw, count) = row?;
            any = true;

            let material = SpacerMaterial::parse(&material_raw).ok_or_else(|| {
                RepositoryError::FieldValueError {
                    field: "material".to_string(),
                    message: format!("未知材质: {}", material_raw),
                }
            })?;
            let denomination: Denomination =
                denomination_raw
                    .parse()
                    .map_err(|e| RepositoryError::FieldValueError {
                        field: "denomination".to_string(),
                        message: format!("{}", e),
                    })?;
            let count = u32::try_from(count).map_err(|_| RepositoryError::FieldValueError {
                field: "count".to_string(),
                message: format!("块数超出范围: {}", count),
            })?;

            match material {
                SpacerMaterial::Metal => metal.insert(denomination, count),
                SpacerMaterial::Plastic => plastic.insert(denomination, count),
            };
        }

        Ok(if any {
            Some(InventoryLedger::from_pools(metal, plastic))
        } else {
            None
        })
    }

    /// 读取库存; 新库自动写入车间出厂库存
    pub fn load_or_seed(&self) -> RepositoryResult<InventoryLedger> {
        match self.load()? {
            Some(ledger) => Ok(ledger),
            None => {
                tracing::info!("库存表为空, 写入车间出厂库存");
                let ledger = InventoryLedger::shop_default();
                self.save(&ledger)?;
                Ok(ledger)
            }
        }
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 整体覆盖保存（单事务）
    pub fn save(&self, ledger: &InventoryLedger) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM spacer_inventory", [])?;

        let mut count = 0;
        for material in SpacerMaterial::ALL {
            for (denomination, units) in ledger.pool(material) {
                tx.execute(
                    r#"
                    INSERT INTO spacer_inventory (material, denomination, count, updated_at)
                    VALUES (?1, ?2, ?3, datetime('now'))
                    "#,
                    params![material.as_str(), denomination.to_string(), *units as i64],
                )?;
                count += 1;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    /// 修改单个规格块数（UPSERT）
    pub fn update_count(
        &self,
        material: SpacerMaterial,
        denomination: Denomination,
        count: u32,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO spacer_inventory (material, denomination, count, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(material, denomination)
            DO UPDATE SET count = ?3, updated_at = datetime('now')
            "#,
            params![material.as_str(), denomination.to_string(), count as i64],
        )?;
        Ok(())
    }
}
