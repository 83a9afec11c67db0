// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试作业与库存构造
// ==========================================

#![allow(dead_code)]

use slitter_spacer::db::{ensure_schema, open_sqlite_connection};
use slitter_spacer::domain::{
    CoilMaterial, Denomination, InventoryLedger, JobRun, SpacerMaterial, SpacerPool,
};
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

pub fn d(inches: f64) -> Denomination {
    Denomination::from_inches(inches).unwrap()
}

pub fn pool(entries: &[(f64, u32)]) -> SpacerPool {
    entries.iter().map(|&(v, c)| (d(v), c)).collect()
}

/// 按 (规格, 块数) 构造台账
pub fn ledger(metal: &[(f64, u32)], plastic: &[(f64, u32)]) -> InventoryLedger {
    InventoryLedger::from_pools(pool(metal), pool(plastic))
}

/// 常用作业: 料厚 0.020, 间隙 10%, 刀厚 0.250/0.250, 卷宽 6.0
pub fn sample_job(cut_text: &str) -> JobRun {
    let mut job = JobRun::from_cut_text(cut_text).unwrap();
    job.customer = Some("TEST".to_string());
    job.thickness_in = 0.020;
    job.clearance_pct = 10.0;
    job.female_knife = 0.25;
    job.male_knife = 0.25;
    job.coil_width = Some(6.0);
    job.material = CoilMaterial::Aluminum;
    job
}

/// 台账某材质全部块数
pub fn material_units(ledger: &InventoryLedger, material: SpacerMaterial) -> u64 {
    ledger.pool(material).values().map(|&c| c as u64).sum()
}
