// ==========================================
// 生产订单追踪系统 - 工位扫码顺序校验
// ==========================================
// 规则:
// - 期望序号 = 同一 (订单, 部件, 设备组) 的历史扫码数 + 1
// - 期望序号 > 设备组最大扫码次数 → ScanLimitExceeded
// - 工位与期望步骤不符 → OutOfSequenceScan
// 说明: 序号由历史推导,不接受客户端上报
// ==========================================

use crate::domain::scan::{ScanEvent, SequenceKey};
use crate::domain::station::DeviceGroup;
use crate::domain::types::StationName;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::scan_event_repo::ScanEventRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// 校验通过后的扫码位置
#[derive(Debug, Clone, PartialEq)]
pub struct SequencePosition {
    pub ordinal: u8,
    /// 同一序列键下的历史扫码 (时间升序)
    pub prior_scans: Vec<ScanEvent>,
}

impl SequencePosition {
    /// 第 ordinal 步的扫码时间
    pub fn step_scanned_at(&self, ordinal: u8) -> Option<DateTime<Utc>> {
        self.prior_scans
            .iter()
            .find(|s| s.ordinal == ordinal)
            .map(|s| s.scanned_at)
    }
}

// ==========================================
// StationSequenceValidator
// ==========================================
pub struct StationSequenceValidator {
    scan_repo: Arc<ScanEventRepository>,
}

impl StationSequenceValidator {
    pub fn new(scan_repo: Arc<ScanEventRepository>) -> Self {
        Self { scan_repo }
    }

    /// 由历史扫码数推导本次序号 (纯函数)
    pub fn resolve_ordinal(
        group: &DeviceGroup,
        prior_count: usize,
        station_name: StationName,
    ) -> EngineResult<u8> {
        let expected = prior_count + 1;
        if expected > group.max_scans() as usize {
            return Err(EngineError::ScanLimitExceeded {
                device_group: group.key.clone(),
                max_scans: group.max_scans(),
            });
        }

        let expected = expected as u8;
        match group.step(expected) {
            Some(step) if step.station_name == station_name => Ok(expected),
            Some(step) => Err(EngineError::OutOfSequenceScan {
                device_group: group.key.clone(),
                expected_ordinal: expected,
                expected_station: step.station_name,
                actual_station: station_name,
            }),
            None => Err(EngineError::ScanLimitExceeded {
                device_group: group.key.clone(),
                max_scans: group.max_scans(),
            }),
        }
    }

    /// 读取历史扫码并校验本次扫码顺序
    pub fn validate(
        &self,
        group: &DeviceGroup,
        order_id: &str,
        part_id: Option<&str>,
        station_name: StationName,
    ) -> EngineResult<SequencePosition> {
        let key = SequenceKey::new(order_id, part_id, &group.key);
        let prior_scans = self.scan_repo.find_by_sequence(&key)?;
        let ordinal = Self::resolve_ordinal(group, prior_scans.len(), station_name)?;

        Ok(SequencePosition {
            ordinal,
            prior_scans,
        })
    }
}
