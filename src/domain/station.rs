// ==========================================
// 生产订单追踪系统 - 工位与设备组拓扑
// ==========================================
// 职责: 工位 (Station)、设备组 (DeviceGroup)、扫码步骤序号
// 说明: 序号是一等数据,不从界面文案 ("1. Okutma") 推导
// 红线: 拓扑仅由管理员修改,扫码路径只读
// ==========================================

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::StationName;

/// 默认最小停留时间 (分钟)
pub const DEFAULT_DWELL_MINUTES: i64 = 30;

// ==========================================
// Station - 工位
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: String,
    pub name: StationName,
    pub active: bool,
    pub device_group_key: String,
}

// ==========================================
// DeviceStep - 设备组内的扫码步骤
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStep {
    pub ordinal: u8, // 1 或 2
    pub station_name: StationName,
}

// ==========================================
// DeviceGroup - 设备组 (一台物理扫码设备覆盖 1~2 个逻辑工位)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceGroup {
    pub key: String,
    pub sequence: u32,            // 在产线上的先后位置
    pub steps: Vec<DeviceStep>,   // 按 ordinal 升序
    pub has_wait_rule: bool,      // true: 第 2 步需满足最小停留时间
    pub min_dwell_secs: i64,
}

impl DeviceGroup {
    pub fn new(key: &str, sequence: u32, stations: &[StationName]) -> Self {
        let steps = stations
            .iter()
            .enumerate()
            .map(|(idx, name)| DeviceStep {
                ordinal: (idx + 1) as u8,
                station_name: *name,
            })
            .collect();

        Self {
            key: key.to_string(),
            sequence,
            steps,
            has_wait_rule: false,
            min_dwell_secs: DEFAULT_DWELL_MINUTES * 60,
        }
    }

    /// 启用停留时间规则
    pub fn with_wait_rule(mut self, min_dwell: Duration) -> Self {
        self.has_wait_rule = true;
        self.min_dwell_secs = min_dwell.num_seconds();
        self
    }

    /// 最大扫码次数 = 步骤数
    pub fn max_scans(&self) -> u8 {
        self.steps.len() as u8
    }

    pub fn min_dwell(&self) -> Duration {
        Duration::seconds(self.min_dwell_secs)
    }

    /// 按序号取步骤 (序号从 1 开始)
    pub fn step(&self, ordinal: u8) -> Option<&DeviceStep> {
        self.steps.iter().find(|s| s.ordinal == ordinal)
    }

    /// 该工位在本组中的序号
    pub fn ordinal_of(&self, station_name: StationName) -> Option<u8> {
        self.steps
            .iter()
            .find(|s| s.station_name == station_name)
            .map(|s| s.ordinal)
    }

    pub fn first_station(&self) -> Option<StationName> {
        self.step(1).map(|s| s.station_name)
    }
}

// ==========================================
// Topology - 设备组/工位拓扑快照 (不可变)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    stations: HashMap<String, Station>,
    groups: Vec<DeviceGroup>, // 按 sequence 升序
}

/// 标准设备组键
pub mod device_group_keys {
    pub const EBATLAMA: &str = "EBATLAMA_DEVICE";
    pub const BANTLAMA: &str = "BANTLAMA_DEVICE";
    pub const TESLIM: &str = "TESLIM_DEVICE";
}

impl Topology {
    pub fn new(groups: Vec<DeviceGroup>, stations: Vec<Station>) -> Self {
        let mut groups = groups;
        groups.sort_by_key(|g| g.sequence);
        for group in groups.iter_mut() {
            group.steps.sort_by_key(|s| s.ordinal);
        }

        Self {
            stations: stations.into_iter().map(|s| (s.id.clone(), s)).collect(),
            groups,
        }
    }

    /// 标准产线拓扑
    ///
    /// | 设备组 | 步骤 | 停留规则 |
    /// |---|---|---|
    /// | EBATLAMA_DEVICE | HAZIRLIK → EBATLAMA | 30 分钟 |
    /// | BANTLAMA_DEVICE | BANTLAMA | 无 |
    /// | TESLIM_DEVICE | KONTROL → TESLİMAT | 无 |
    pub fn standard(dwell: Duration) -> Self {
        use device_group_keys::*;

        let groups = vec![
            DeviceGroup::new(EBATLAMA, 1, &[StationName::Hazirlik, StationName::Ebatlama])
                .with_wait_rule(dwell),
            DeviceGroup::new(BANTLAMA, 2, &[StationName::Bantlama]),
            DeviceGroup::new(TESLIM, 3, &[StationName::Kontrol, StationName::Teslimat]),
        ];

        let stations = groups
            .iter()
            .flat_map(|g| {
                g.steps.iter().map(move |step| Station {
                    id: standard_station_id(step.station_name),
                    name: step.station_name,
                    active: true,
                    device_group_key: g.key.clone(),
                })
            })
            .collect();

        Self::new(groups, stations)
    }

    pub fn station(&self, station_id: &str) -> Option<&Station> {
        self.stations.get(station_id)
    }

    pub fn device_group(&self, key: &str) -> Option<&DeviceGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn device_groups(&self) -> &[DeviceGroup] {
        &self.groups
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    /// 在完成某设备组第 ordinal 步后,下一个应扫码的工位
    ///
    /// 同组内有下一步则取下一步,否则取下一个设备组的第一个工位
    pub fn next_station(&self, group_key: &str, ordinal: u8) -> Option<StationName> {
        let group = self.device_group(group_key)?;
        if let Some(step) = group.step(ordinal + 1) {
            return Some(step.station_name);
        }

        self.groups
            .iter()
            .filter(|g| g.sequence > group.sequence)
            .find_map(|g| g.first_station())
    }
}

/// 标准拓扑中的工位ID
pub fn standard_station_id(name: StationName) -> String {
    match name {
        StationName::Teslimat => "ST-TESLIMAT".to_string(),
        other => format!("ST-{}", other.as_str()),
    }
}
