// ==========================================
// 生产订单追踪系统 - 工位/设备组拓扑仓储
// ==========================================
// 对齐: device_group / device_step / station 表
// 红线: 只有管理操作写入; 扫码路径通过 load_topology 读取快照
// ==========================================

use crate::domain::station::{DeviceGroup, DeviceStep, Station, Topology};
use crate::domain::types::StationName;
use crate::repository::error::{conversion_error, RepositoryError, RepositoryResult};
use chrono::Duration;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

// ==========================================
// StationRepository - 拓扑仓储
// ==========================================
pub struct StationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 管理操作
    // ==========================================

    /// 创建或替换设备组 (含步骤)
    pub fn upsert_device_group(&self, group: &DeviceGroup) -> RepositoryResult<()> {
        if group.steps.is_empty() || group.steps.len() > 2 {
            return Err(RepositoryError::FieldValueError {
                field: "steps".to_string(),
                message: format!("设备组 {} 步骤数必须为 1 或 2", group.key),
            });
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO device_group (group_key, sequence, has_wait_rule, min_dwell_secs)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(group_key) DO UPDATE SET
                sequence = excluded.sequence,
                has_wait_rule = excluded.has_wait_rule,
                min_dwell_secs = excluded.min_dwell_secs
            "#,
            params![
                group.key,
                group.sequence,
                group.has_wait_rule,
                group.min_dwell_secs
            ],
        )?;

        tx.execute(
            "DELETE FROM device_step WHERE group_key = ?",
            params![group.key],
        )?;
        for step in &group.steps {
            tx.execute(
                "INSERT INTO device_step (group_key, ordinal, station_name) VALUES (?, ?, ?)",
                params![group.key, step.ordinal, step.station_name.as_str()],
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    /// 创建或更新工位
    pub fn upsert_station(&self, station: &Station) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO station (station_id, name, active, group_key)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(station_id) DO UPDATE SET
                name = excluded.name,
                active = excluded.active,
                group_key = excluded.group_key
            "#,
            params![
                station.id,
                station.name.as_str(),
                station.active,
                station.device_group_key
            ],
        )?;
        Ok(())
    }

    /// 启用/停用工位
    pub fn set_station_active(&self, station_id: &str, active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE station SET active = ? WHERE station_id = ?",
            params![active, station_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Station".to_string(),
                id: station_id.to_string(),
            });
        }
        Ok(())
    }

    /// 写入标准拓扑 (已存在的记录保持不变)
    ///
    /// # 返回
    /// 新写入的设备组数量
    pub fn seed_standard_topology(&self, dwell: Duration) -> RepositoryResult<usize> {
        let standard = Topology::standard(dwell);
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut inserted = 0;
        for group in standard.device_groups() {
            let rows = tx.execute(
                r#"
                INSERT OR IGNORE INTO device_group (group_key, sequence, has_wait_rule, min_dwell_secs)
                VALUES (?, ?, ?, ?)
                "#,
                params![
                    group.key,
                    group.sequence,
                    group.has_wait_rule,
                    group.min_dwell_secs
                ],
            )?;
            if rows == 0 {
                continue;
            }
            inserted += 1;
            for step in &group.steps {
                tx.execute(
                    "INSERT OR IGNORE INTO device_step (group_key, ordinal, station_name) VALUES (?, ?, ?)",
                    params![group.key, step.ordinal, step.station_name.as_str()],
                )?;
            }
        }

        for station in standard.stations() {
            tx.execute(
                "INSERT OR IGNORE INTO station (station_id, name, active, group_key) VALUES (?, ?, ?, ?)",
                params![
                    station.id,
                    station.name.as_str(),
                    station.active,
                    station.device_group_key
                ],
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        if inserted > 0 {
            info!(groups = inserted, "标准拓扑已写入");
        }
        Ok(inserted)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 读取完整拓扑快照
    pub fn load_topology(&self) -> RepositoryResult<Topology> {
        let conn = self.get_conn()?;

        let mut steps_by_group: HashMap<String, Vec<DeviceStep>> = HashMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT group_key, ordinal, station_name FROM device_step")?;
            let rows = stmt.query_map([], |row| {
                let group_key: String = row.get(0)?;
                let raw: String = row.get(2)?;
                let station_name = StationName::parse(&raw)
                    .ok_or_else(|| conversion_error(2, "station_name", &raw))?;
                Ok((
                    group_key,
                    DeviceStep {
                        ordinal: row.get(1)?,
                        station_name,
                    },
                ))
            })?;
            for row in rows {
                let (group_key, step) = row?;
                steps_by_group.entry(group_key).or_default().push(step);
            }
        }

        let mut stmt = conn.prepare(
            "SELECT group_key, sequence, has_wait_rule, min_dwell_secs FROM device_group",
        )?;
        let groups = stmt
            .query_map([], |row| {
                let key: String = row.get(0)?;
                Ok(DeviceGroup {
                    steps: steps_by_group.remove(&key).unwrap_or_default(),
                    key,
                    sequence: row.get(1)?,
                    has_wait_rule: row.get(2)?,
                    min_dwell_secs: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut stmt = conn.prepare("SELECT station_id, name, active, group_key FROM station")?;
        let stations = stmt
            .query_map([], |row| {
                let raw: String = row.get(1)?;
                Ok(Station {
                    id: row.get(0)?,
                    name: StationName::parse(&raw)
                        .ok_or_else(|| conversion_error(1, "name", &raw))?,
                    active: row.get(2)?,
                    device_group_key: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(Topology::new(groups, stations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::station::device_group_keys::*;

    fn setup() -> StationRepository {
        let conn = crate::db::open_in_memory().unwrap();
        StationRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_seed_and_load_standard_topology() {
        let repo = setup();
        assert_eq!(repo.seed_standard_topology(Duration::minutes(30)).unwrap(), 3);

        let topology = repo.load_topology().unwrap();
        assert_eq!(topology, Topology::standard(Duration::minutes(30)));
    }

    #[test]
    fn test_seed_keeps_admin_changes() {
        let repo = setup();
        repo.seed_standard_topology(Duration::minutes(30)).unwrap();

        let group = DeviceGroup::new(EBATLAMA, 1, &[StationName::Hazirlik, StationName::Ebatlama])
            .with_wait_rule(Duration::minutes(45));
        repo.upsert_device_group(&group).unwrap();
        repo.set_station_active("ST-BANTLAMA", false).unwrap();

        assert_eq!(repo.seed_standard_topology(Duration::minutes(30)).unwrap(), 0);

        let topology = repo.load_topology().unwrap();
        assert_eq!(
            topology.device_group(EBATLAMA).unwrap().min_dwell(),
            Duration::minutes(45)
        );
        assert!(!topology.station("ST-BANTLAMA").unwrap().active);
    }

    #[test]
    fn test_upsert_rejects_three_step_group() {
        let repo = setup();
        let group = DeviceGroup::new(
            "BIG",
            9,
            &[StationName::Hazirlik, StationName::Ebatlama, StationName::Bantlama],
        );
        assert!(matches!(
            repo.upsert_device_group(&group),
            Err(RepositoryError::FieldValueError { .. })
        ));
    }

    #[test]
    fn test_set_unknown_station_active_is_not_found() {
        let repo = setup();
        assert!(matches!(
            repo.set_station_active("ST-NOPE", true),
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
