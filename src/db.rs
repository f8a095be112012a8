// ==========================================
// 生产订单追踪系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout,保证请求不会无限期阻塞
// - 建表幂等; 审计/扫码表通过触发器保证只追加
// ==========================================

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存数据库并建表 (单元测试用)
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 建表 (幂等)
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS device_group (
            group_key TEXT PRIMARY KEY,
            sequence INTEGER NOT NULL,
            has_wait_rule INTEGER NOT NULL DEFAULT 0,
            min_dwell_secs INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS device_step (
            group_key TEXT NOT NULL REFERENCES device_group(group_key) ON DELETE CASCADE,
            ordinal INTEGER NOT NULL CHECK (ordinal IN (1, 2)),
            station_name TEXT NOT NULL,
            PRIMARY KEY (group_key, ordinal)
        );

        CREATE TABLE IF NOT EXISTS station (
            station_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            group_key TEXT NOT NULL REFERENCES device_group(group_key)
        );

        CREATE TABLE IF NOT EXISTS job (
            job_id TEXT PRIMARY KEY,
            order_no TEXT NOT NULL,
            customer TEXT NOT NULL,
            part_count INTEGER NOT NULL,
            state TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            error_code TEXT,
            error_message TEXT,
            opti_mode TEXT NOT NULL,
            current_station TEXT,
            open_sequences TEXT NOT NULL DEFAULT '[]',
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_job_state ON job(state);

        CREATE TABLE IF NOT EXISTS scan_event (
            scan_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES job(job_id),
            part_id TEXT,
            station_id TEXT NOT NULL,
            station_name TEXT NOT NULL,
            group_key TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            scan_type TEXT NOT NULL,
            scanned_at TEXT NOT NULL,
            client_ts TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS uq_scan_event_sequence
            ON scan_event(order_id, COALESCE(part_id, ''), group_key, ordinal);

        CREATE TABLE IF NOT EXISTS audit_event (
            audit_id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL REFERENCES job(job_id),
            event_type TEXT NOT NULL,
            message TEXT NOT NULL,
            details_json TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_event_job ON audit_event(job_id, created_at);

        CREATE TRIGGER IF NOT EXISTS trg_audit_event_no_update
            BEFORE UPDATE ON audit_event
            BEGIN SELECT RAISE(ABORT, 'audit_event is append-only'); END;
        CREATE TRIGGER IF NOT EXISTS trg_audit_event_no_delete
            BEFORE DELETE ON audit_event
            BEGIN SELECT RAISE(ABORT, 'audit_event is append-only'); END;
        CREATE TRIGGER IF NOT EXISTS trg_scan_event_no_update
            BEFORE UPDATE ON scan_event
            BEGIN SELECT RAISE(ABORT, 'scan_event is append-only'); END;
        CREATE TRIGGER IF NOT EXISTS trg_scan_event_no_delete
            BEFORE DELETE ON scan_event
            BEGIN SELECT RAISE(ABORT, 'scan_event is append-only'); END;
        CREATE TRIGGER IF NOT EXISTS trg_job_no_delete
            BEFORE DELETE ON job
            BEGIN SELECT RAISE(ABORT, 'job rows are never deleted'); END;
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// 时间戳存储格式
// ==========================================
// 固定微秒精度 + Z 后缀,字符串字典序即时间序

/// 时间戳 → 存储字符串
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// 存储字符串 → 时间戳
pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
