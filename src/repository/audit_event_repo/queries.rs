use super::core::AuditEventRepository;
use crate::db::parse_ts;
use crate::domain::audit::AuditEvent;
use crate::repository::error::{conversion_error, RepositoryResult};
use rusqlite::{params, Result as SqliteResult, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT audit_id, job_id, event_type, message, details_json, created_at
    FROM audit_event
"#;

impl AuditEventRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按ID查询单个审计事件
    pub fn find_by_id(&self, audit_id: &str) -> RepositoryResult<Option<AuditEvent>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE audit_id = ?", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params![audit_id], map_row) {
            Ok(event) => Ok(Some(event)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询工单的全部审计事件 (旧 → 新)
    pub fn find_by_job_id(&self, job_id: &str) -> RepositoryResult<Vec<AuditEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE job_id = ? ORDER BY created_at ASC, rowid ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let events = stmt
            .query_map(params![job_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(events)
    }

    /// 按事件类型查询工单审计事件 (旧 → 新)
    pub fn find_by_job_and_type(
        &self,
        job_id: &str,
        event_type: &str,
    ) -> RepositoryResult<Vec<AuditEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE job_id = ? AND event_type = ? ORDER BY created_at ASC, rowid ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let events = stmt
            .query_map(params![job_id, event_type], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(events)
    }

    /// 查询最近的审计事件 (新 → 旧)
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<AuditEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} ORDER BY created_at DESC, rowid DESC LIMIT ?",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let events = stmt
            .query_map(params![limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(events)
    }

    /// 统计工单审计事件数量
    pub fn count_by_job(&self, job_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM audit_event WHERE job_id = ?",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// 行映射
fn map_row(row: &Row) -> SqliteResult<AuditEvent> {
    let details_raw: Option<String> = row.get(4)?;
    let created_raw: String = row.get(5)?;

    Ok(AuditEvent {
        id: row.get(0)?,
        job_id: row.get(1)?,
        event_type: row.get(2)?,
        message: row.get(3)?,
        details_json: details_raw.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_ts(&created_raw)
            .ok_or_else(|| conversion_error(5, "created_at", &created_raw))?,
    })
}
