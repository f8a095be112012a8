// ==========================================
// 生产订单追踪系统 - 扫码事件领域模型
// ==========================================
// 红线: ScanEvent 一经写入不可修改/删除
// 说明: scanned_at 由扫码接入方赋值,不信任客户端时间
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{ScanType, StationName};

// ==========================================
// RawScan - 原始扫码请求 (条码枪上报)
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScan {
    pub order_id: String,
    #[serde(default)]
    pub part_id: Option<String>,
    pub station_id: String,
    pub scan_type: String,
    /// 客户端时间 (RFC3339),仅作留档
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl RawScan {
    pub fn order(order_id: &str, station_id: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            part_id: None,
            station_id: station_id.to_string(),
            scan_type: ScanType::Order.to_string(),
            timestamp: None,
        }
    }

    pub fn part(order_id: &str, part_id: &str, station_id: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            part_id: Some(part_id.to_string()),
            station_id: station_id.to_string(),
            scan_type: ScanType::Part.to_string(),
            timestamp: None,
        }
    }
}

// ==========================================
// ParsedScan - 解析校验后的扫码
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScan {
    pub order_id: String,
    pub part_id: Option<String>,
    pub station_id: String,
    pub scan_type: ScanType,
    pub client_timestamp: Option<DateTime<Utc>>,
}

// ==========================================
// ScanEvent - 已接受的扫码事实
// ==========================================
// 对齐: scan_event 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvent {
    pub id: String,
    pub order_id: String,
    pub part_id: Option<String>,
    pub station_id: String,
    pub station_name: StationName,
    pub device_group_key: String,
    pub ordinal: u8,
    pub scan_type: ScanType,
    pub scanned_at: DateTime<Utc>,
    pub client_timestamp: Option<DateTime<Utc>>,
}

// ==========================================
// SequenceKey - 扫码序列键 (order, part, device group)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceKey {
    pub order_id: String,
    pub part_id: Option<String>,
    pub device_group_key: String,
}

impl SequenceKey {
    pub fn new(order_id: &str, part_id: Option<&str>, device_group_key: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            part_id: part_id.map(|p| p.to_string()),
            device_group_key: device_group_key.to_string(),
        }
    }

    /// 用于按键加锁的字符串形式
    pub fn lock_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.order_id,
            self.part_id.as_deref().unwrap_or("-"),
            self.device_group_key
        )
    }
}
