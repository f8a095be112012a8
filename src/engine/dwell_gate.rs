// ==========================================
// 生产订单追踪系统 - 停留时间闸门
// ==========================================
// 规则: now - 第 1 步扫码时间 >= 最小停留时间 → 放行 (边界包含)
// 说明: 仅对有停留规则的设备组的第 2 步生效; 无状态
// ==========================================

use crate::domain::station::DeviceGroup;
use crate::engine::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};

pub struct DwellTimeGate;

impl DwellTimeGate {
    /// 检查停留时间
    ///
    /// # 错误
    /// - `DwellNotElapsed { remaining }`: 尚需等待的时长
    pub fn check(
        group: &DeviceGroup,
        prior_scan_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        if !group.has_wait_rule {
            return Ok(());
        }

        let elapsed = now - prior_scan_at;
        let min_dwell = group.min_dwell();
        if elapsed >= min_dwell {
            Ok(())
        } else {
            Err(EngineError::DwellNotElapsed {
                remaining: min_dwell - elapsed,
            })
        }
    }
}
