use crate::db::format_ts;
use crate::domain::audit::AuditEvent;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// AuditEventRepository - 审计事件仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct AuditEventRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuditEventRepository {
    /// 创建新的审计事件仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 追加审计事件
    ///
    /// # 返回
    /// - `Ok(id)`: 成功插入,返回事件ID
    /// - `Err(...)`: 数据库错误
    #[cfg(test)]
    pub(crate) fn insert(&self, event: &AuditEvent) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        insert_audit_event(&conn, event)?;
        Ok(event.id.clone())
    }
}

/// 在给定连接/事务上追加审计事件
///
/// 工单状态写入与审计写入需要同一事务时使用
pub(crate) fn insert_audit_event(conn: &Connection, event: &AuditEvent) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO audit_event (
            audit_id, job_id, event_type, message, details_json, created_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            event.id,
            event.job_id,
            event.event_type,
            event.message,
            event.details_json.as_ref().map(|v| v.to_string()),
            format_ts(&event.created_at),
        ],
    )?;
    Ok(())
}
