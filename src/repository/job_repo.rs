// ==========================================
// 纵剪分条隔套配刀系统 - 作业记录仓储
// ==========================================
// 职责: job_record 表, 保存作业参数与计算报告 (JSON)
// 用途: 作业保存/加载、"上一次作业"
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::allocation::AllocationReport;
use crate::domain::job::JobRun;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// 作业记录实体
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: String,
    pub customer: Option<String>,
    pub job: JobRun,
    pub report: Option<AllocationReport>,
    pub config_snapshot_json: Option<String>,
    pub created_at: NaiveDateTime,
}

impl JobRecord {
    pub fn new(job: JobRun) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            customer: job.customer.clone(),
            job,
            report: None,
            config_snapshot_json: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn with_report(mut self, report: AllocationReport) -> Self {
        self.report = Some(report);
        self
    }

    pub fn with_config_snapshot(mut self, snapshot_json: String) -> Self {
        self.config_snapshot_json = Some(snapshot_json);
        self
    }
}

// 原始行, JSON 字段在锁外解析
struct JobRow {
    job_id: String,
    customer: Option<String>,
    job_json: String,
    report_json: Option<String>,
    config_snapshot_json: Option<String>,
    created_at: String,
}

pub struct JobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl JobRepository {
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

    /// 保存作业（同 job_id 覆盖）
    pub fn save(&self, record: &JobRecord) -> RepositoryResult<String> {
        let job_json = serde_json::to_string(&record.job)?;
        let report_json = record
            .report
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO job_record (
                job_id, customer, job_json, report_json, config_snapshot_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(job_id) DO UPDATE SET
                customer = ?2, job_json = ?3, report_json = ?4,
                config_snapshot_json = ?5, created_at = ?6
            "#,
            params![
                record.job_id,
                record.customer,
                job_json,
                report_json,
                record.config_snapshot_json,
                record.created_at.format(TS_FORMAT).to_string(),
            ],
        )?;
        Ok(record.job_id.clone())
    }

    pub fn find_by_id(&self, job_id: &str) -> RepositoryResult<Option<JobRecord>> {
        let row = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                r#"
                SELECT job_id, customer, job_json, report_json, config_snapshot_json, created_at
                FROM job_record
                WHERE job_id = ?1
                "#,
            )?;
            let result = stmt.query_row(params![job_id], map_row);
            match result {
                Ok(row) => Some(row),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e.into()),
            }
        };
        row.map(into_record).transpose()
    }

    /// 最近一次保存的作业
    pub fn find_latest(&self) -> RepositoryResult<Option<JobRecord>> {
        Ok(self.list_recent(1)?.into_iter().next())
    }

    /// 最近的 N 个作业（新到旧）
    pub fn list_recent(&self, limit: i64) -> RepositoryResult<Vec<JobRecord>> {
        let rows = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                r#"
                SELECT job_id, customer, job_json, report_json, config_snapshot_json, created_at
                FROM job_record
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?1
                "#,
            )?;
            let rows = stmt
                .query_map(params![limit], map_row)?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };
        rows.into_iter().map(into_record).collect()
    }
}

fn map_row(row: &Row) -> SqliteResult<JobRow> {
    Ok(JobRow {
        job_id: row.get(0)?,
        customer: row.get(1)?,
        job_json: row.get(2)?,
        report_json: row.get(3)?,
        config_snapshot_json: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn into_record(row: JobRow) -> RepositoryResult<JobRecord> {
    let created_at = NaiveDateTime::parse_from_str(&row.created_at, TS_FORMAT).map_err(|e| {
        RepositoryError::FieldValueError {
            field: "created_at".to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(JobRecord {
        job_id: row.job_id,
        customer: row.customer,
        job: serde_json::from_str(&row.job_json)?,
        report: row
            .report_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        config_snapshot_json: row.config_snapshot_json,
        created_at,
    })
}
