// ==========================================
// 生产订单追踪系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 输出: 不可变的 EngineConfig 快照
// ==========================================

use crate::config::engine_config::{
    EngineConfig, PollerConfig, DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_POLL_BASE_INTERVAL_MS,
    DEFAULT_POLL_MAX_INTERVAL_MS, DEFAULT_RETRY_COUNT_MAX,
};
use crate::domain::station::DEFAULT_DWELL_MINUTES;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::station_repo::StationRepository;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值 (存在则覆盖)
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 读取数值配置; 缺失或格式错误时使用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + Copy,
    {
        let raw = match self.get_global_config_value(key)? {
            Some(raw) => raw,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    "配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::Other(anyhow::Error::new(e)))
    }

    // ===== 工作流参数 =====

    /// 重试上限 (默认 3)
    pub fn get_retry_count_max(&self) -> RepositoryResult<u32> {
        self.get_parsed_or_default(config_keys::RETRY_COUNT_MAX, DEFAULT_RETRY_COUNT_MAX)
    }

    /// 默认停留时间 (分钟, 默认 30)
    pub fn get_default_dwell_minutes(&self) -> RepositoryResult<i64> {
        let minutes =
            self.get_parsed_or_default(config_keys::DEFAULT_DWELL_MINUTES, DEFAULT_DWELL_MINUTES)?;
        Ok(minutes.max(0))
    }

    /// 锁等待上限 (毫秒, 默认 5000)
    pub fn get_lock_timeout_ms(&self) -> RepositoryResult<u64> {
        self.get_parsed_or_default(config_keys::LOCK_TIMEOUT_MS, DEFAULT_LOCK_TIMEOUT_MS)
    }

    // ===== 轮询参数 =====

    pub fn get_poller_config(&self) -> RepositoryResult<PollerConfig> {
        let base = self.get_parsed_or_default(
            config_keys::POLL_BASE_INTERVAL_MS,
            DEFAULT_POLL_BASE_INTERVAL_MS,
        )?;
        let max = self.get_parsed_or_default(
            config_keys::POLL_MAX_INTERVAL_MS,
            DEFAULT_POLL_MAX_INTERVAL_MS,
        )?;
        Ok(PollerConfig::new(
            StdDuration::from_millis(base),
            StdDuration::from_millis(max),
        ))
    }

    /// 构建引擎配置快照
    ///
    /// 拓扑从工位仓储读取; 之后的配置修改不影响已构建的快照
    pub fn load_engine_config(
        &self,
        station_repo: &StationRepository,
    ) -> RepositoryResult<EngineConfig> {
        let topology = station_repo.load_topology()?;
        Ok(EngineConfig {
            retry_count_max: self.get_retry_count_max()?,
            default_dwell: chrono::Duration::minutes(self.get_default_dwell_minutes()?),
            lock_timeout: StdDuration::from_millis(self.get_lock_timeout_ms()?),
            poller: self.get_poller_config()?,
            topology,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 工作流
    pub const RETRY_COUNT_MAX: &str = "retry_count_max";
    pub const DEFAULT_DWELL_MINUTES: &str = "default_dwell_minutes";

    // 并发
    pub const LOCK_TIMEOUT_MS: &str = "lock_timeout_ms";

    // 轮询
    pub const POLL_BASE_INTERVAL_MS: &str = "poll_base_interval_ms";
    pub const POLL_MAX_INTERVAL_MS: &str = "poll_max_interval_ms";
}
