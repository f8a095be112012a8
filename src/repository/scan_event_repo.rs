// ==========================================
// 生产订单追踪系统 - 扫码事件数据仓储
// ==========================================
// 对齐: scan_event 表
// 红线: 只追加; 写入只发生在工单迁移事务内
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::scan::{ScanEvent, SequenceKey};
use crate::domain::types::{ScanType, StationName};
use crate::repository::error::{conversion_error, RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT scan_id, order_id, part_id, station_id, station_name, group_key,
           ordinal, scan_type, scanned_at, client_ts
    FROM scan_event
"#;

// ==========================================
// ScanEventRepository - 扫码事件仓储
// ==========================================
pub struct ScanEventRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScanEventRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询某序列键下的历史扫码 (按时间升序)
    ///
    /// part_id 为空时只匹配整单扫码 (`IS NULL`)
    pub fn find_by_sequence(&self, key: &SequenceKey) -> RepositoryResult<Vec<ScanEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE order_id = ? AND part_id IS ? AND group_key = ? ORDER BY scanned_at ASC, ordinal ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let scans = stmt
            .query_map(
                params![key.order_id, key.part_id, key.device_group_key],
                map_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(scans)
    }

    /// 查询订单的全部扫码 (按时间升序)
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<ScanEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE order_id = ? ORDER BY scanned_at ASC, rowid ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let scans = stmt
            .query_map(params![order_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(scans)
    }
}

/// 在给定连接/事务上写入扫码事件
pub(crate) fn insert_scan_event(conn: &Connection, scan: &ScanEvent) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO scan_event (
            scan_id, order_id, part_id, station_id, station_name, group_key,
            ordinal, scan_type, scanned_at, client_ts
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            scan.id,
            scan.order_id,
            scan.part_id,
            scan.station_id,
            scan.station_name.as_str(),
            scan.device_group_key,
            scan.ordinal,
            scan.scan_type.to_string(),
            format_ts(&scan.scanned_at),
            scan.client_timestamp.as_ref().map(format_ts),
        ],
    )?;
    Ok(())
}

/// 行映射
fn map_row(row: &Row) -> SqliteResult<ScanEvent> {
    let station_raw: String = row.get(4)?;
    let type_raw: String = row.get(7)?;
    let scanned_raw: String = row.get(8)?;
    let client_raw: Option<String> = row.get(9)?;

    Ok(ScanEvent {
        id: row.get(0)?,
        order_id: row.get(1)?,
        part_id: row.get(2)?,
        station_id: row.get(3)?,
        station_name: StationName::parse(&station_raw)
            .ok_or_else(|| conversion_error(4, "station_name", &station_raw))?,
        device_group_key: row.get(5)?,
        ordinal: row.get(6)?,
        scan_type: ScanType::parse(&type_raw)
            .ok_or_else(|| conversion_error(7, "scan_type", &type_raw))?,
        scanned_at: parse_ts(&scanned_raw)
            .ok_or_else(|| conversion_error(8, "scanned_at", &scanned_raw))?,
        client_timestamp: client_raw.as_deref().and_then(parse_ts),
    })
}
