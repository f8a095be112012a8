// ==========================================
// 生产订单追踪系统 - 工单数据仓储
// ==========================================
// 对齐: job 表
// 红线: 写入接口仅供 JobStateMachine 使用 (pub(crate))
// 红线: 工单写入、扫码写入、审计写入在同一事务内提交
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::audit::AuditEvent;
use crate::domain::job::{Job, OpenSequence};
use crate::domain::scan::ScanEvent;
use crate::domain::types::{JobState, OptiMode, StationName};
use crate::repository::audit_event_repo::insert_audit_event;
use crate::repository::error::{conversion_error, RepositoryError, RepositoryResult};
use crate::repository::scan_event_repo::insert_scan_event;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT job_id, order_no, customer, part_count, state, retry_count,
           error_code, error_message, opti_mode, current_station,
           open_sequences, revision, created_at, updated_at
    FROM job
"#;

// ==========================================
// JobRepository - 工单仓储
// ==========================================
pub struct JobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl JobRepository {
    /// 创建新的工单仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作 (仅状态机调用)
    // ==========================================

    /// 插入新工单并追加创建审计
    pub(crate) fn insert_with_audit(&self, job: &Job, audit: &AuditEvent) -> RepositoryResult<()> {
        let open_sequences = encode_open_sequences(job)?;
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO job (
                job_id, order_no, customer, part_count, state, retry_count,
                error_code, error_message, opti_mode, current_station,
                open_sequences, revision, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                job.id,
                job.order_no,
                job.customer,
                job.part_count,
                job.state.as_str(),
                job.retry_count,
                job.error_code,
                job.error_message,
                job.opti_mode.to_string(),
                job.current_station.map(|s| s.as_str()),
                open_sequences,
                job.revision,
                format_ts(&job.created_at),
                format_ts(&job.updated_at),
            ],
        )?;
        insert_audit_event(&tx, audit)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    /// 提交一次状态迁移 (乐观锁)
    ///
    /// # 参数
    /// - `job`: 迁移后的工单 (revision 已 +1)
    /// - `expected_revision`: 读取时的 revision
    /// - `scan`: 触发迁移的扫码事件 (扫码路径)
    /// - `audit`: 本次迁移的审计事件
    ///
    /// # 错误
    /// - `OptimisticLockFailure`: revision 不匹配 (其他写入者已更新)
    /// - `NotFound`: 工单不存在
    /// - 任一写入失败时整个事务回滚
    pub(crate) fn commit_transition(
        &self,
        job: &Job,
        expected_revision: i64,
        scan: Option<&ScanEvent>,
        audit: &AuditEvent,
    ) -> RepositoryResult<()> {
        let open_sequences = encode_open_sequences(job)?;
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let rows = tx.execute(
            r#"
            UPDATE job SET
                state = ?, retry_count = ?, error_code = ?, error_message = ?,
                current_station = ?, open_sequences = ?, revision = ?,
                updated_at = ?
            WHERE job_id = ? AND revision = ?
            "#,
            params![
                job.state.as_str(),
                job.retry_count,
                job.error_code,
                job.error_message,
                job.current_station.map(|s| s.as_str()),
                open_sequences,
                job.revision,
                format_ts(&job.updated_at),
                job.id,
                expected_revision,
            ],
        )?;

        if rows == 0 {
            // 判断是记录不存在还是revision冲突
            let actual: Option<i64> = tx
                .query_row(
                    "SELECT revision FROM job WHERE job_id = ?",
                    params![job.id],
                    |row| row.get(0),
                )
                .optional()?;

            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    entity: "Job".to_string(),
                    id: job.id.clone(),
                    expected: expected_revision,
                    actual,
                },
                None => RepositoryError::NotFound {
                    entity: "Job".to_string(),
                    id: job.id.clone(),
                },
            });
        }

        if let Some(scan) = scan {
            insert_scan_event(&tx, scan)?;
        }
        insert_audit_event(&tx, audit)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按ID查询工单
    pub fn find_by_id(&self, job_id: &str) -> RepositoryResult<Option<Job>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE job_id = ?", SELECT_COLUMNS);
        let job = conn.query_row(&sql, params![job_id], map_row).optional()?;
        Ok(job)
    }

    /// 按状态查询工单 (最近更新在前)
    pub fn list_by_state(&self, state: JobState, limit: i32) -> RepositoryResult<Vec<Job>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE state = ? ORDER BY updated_at DESC LIMIT ?",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params![state.as_str(), limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(jobs)
    }

    /// 查询最近更新的工单
    pub fn list_recent(&self, limit: i32) -> RepositoryResult<Vec<Job>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY updated_at DESC LIMIT ?", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params![limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(jobs)
    }
}

/// 行映射
fn encode_open_sequences(job: &Job) -> RepositoryResult<String> {
    serde_json::to_string(&job.open_sequences)
        .map_err(|e| RepositoryError::Other(anyhow::Error::new(e)))
}

fn map_row(row: &Row) -> SqliteResult<Job> {
    let state_raw: String = row.get(4)?;
    let open_raw: String = row.get(10)?;
    let opti_raw: String = row.get(8)?;
    let station_raw: Option<String> = row.get(9)?;
    let created_raw: String = row.get(12)?;
    let updated_raw: String = row.get(13)?;

    let current_station = match station_raw {
        Some(raw) => Some(
            StationName::parse(&raw).ok_or_else(|| conversion_error(9, "current_station", &raw))?,
        ),
        None => None,
    };

    Ok(Job {
        id: row.get(0)?,
        order_no: row.get(1)?,
        customer: row.get(2)?,
        part_count: row.get(3)?,
        state: JobState::parse(&state_raw).ok_or_else(|| conversion_error(4, "state", &state_raw))?,
        retry_count: row.get(5)?,
        error_code: row.get(6)?,
        error_message: row.get(7)?,
        opti_mode: OptiMode::parse(&opti_raw)
            .ok_or_else(|| conversion_error(8, "opti_mode", &opti_raw))?,
        current_station,
        open_sequences: serde_json::from_str::<Vec<OpenSequence>>(&open_raw)
            .map_err(|_| conversion_error(10, "open_sequences", &open_raw))?,
        revision: row.get(11)?,
        created_at: parse_ts(&created_raw)
            .ok_or_else(|| conversion_error(12, "created_at", &created_raw))?,
        updated_at: parse_ts(&updated_raw)
            .ok_or_else(|| conversion_error(13, "updated_at", &updated_raw))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::AuditEventType;
    use crate::domain::job::NewJob;
    use chrono::{Duration, TimeZone, Utc};

    fn setup() -> JobRepository {
        let conn = crate::db::open_in_memory().unwrap();
        JobRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn create(repo: &JobRepository, id: &str) -> Job {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap();
        let job = NewJob::new("SIP-1", "ACME", 3, OptiMode::A)
            .with_id(id)
            .into_job(now);
        let audit = AuditEvent::new(id, AuditEventType::JobCreated, "created".into(), now);
        repo.insert_with_audit(&job, &audit).unwrap();
        job
    }

    #[test]
    fn test_insert_and_find_by_id() {
        let repo = setup();
        let job = create(&repo, "O1");

        let found = repo.find_by_id("O1").unwrap().unwrap();
        assert_eq!(found, job);
        assert!(repo.find_by_id("O2").unwrap().is_none());
    }

    #[test]
    fn test_commit_transition_bumps_revision() {
        let repo = setup();
        let mut job = create(&repo, "O1");

        job.state = JobState::Prepared;
        job.revision = 1;
        job.updated_at = job.updated_at + Duration::minutes(1);
        let audit = AuditEvent::new("O1", AuditEventType::StateChanged, "prepare".into(), job.updated_at);
        repo.commit_transition(&job, 0, None, &audit).unwrap();

        let found = repo.find_by_id("O1").unwrap().unwrap();
        assert_eq!(found.state, JobState::Prepared);
        assert_eq!(found.revision, 1);
    }

    #[test]
    fn test_stale_revision_is_rejected_without_audit() {
        let repo = setup();
        let mut job = create(&repo, "O1");

        job.state = JobState::Prepared;
        job.revision = 6;
        let audit = AuditEvent::new("O1", AuditEventType::StateChanged, "stale".into(), job.updated_at);
        let result = repo.commit_transition(&job, 5, None, &audit);

        assert!(matches!(
            result,
            Err(RepositoryError::OptimisticLockFailure { expected: 5, actual: 0, .. })
        ));
        let found = repo.find_by_id("O1").unwrap().unwrap();
        assert_eq!(found.state, JobState::New);

        let conn = repo.get_conn().unwrap();
        let audits: i64 = conn
            .query_row("SELECT COUNT(*) FROM audit_event WHERE job_id = 'O1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(audits, 1);
    }

    #[test]
    fn test_commit_unknown_job_is_not_found() {
        let repo = setup();
        let now = Utc::now();
        let job = NewJob::new("SIP-9", "ACME", 1, OptiMode::A)
            .with_id("GHOST")
            .into_job(now);
        let audit = AuditEvent::new("GHOST", AuditEventType::StateChanged, "x".into(), now);
        let result = repo.commit_transition(&job, 0, None, &audit);
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_list_by_state() {
        let repo = setup();
        create(&repo, "O1");
        create(&repo, "O2");

        assert_eq!(repo.list_by_state(JobState::New, 10).unwrap().len(), 2);
        assert!(repo.list_by_state(JobState::Failed, 10).unwrap().is_empty());
        assert_eq!(repo.list_recent(1).unwrap().len(), 1);
    }
}
