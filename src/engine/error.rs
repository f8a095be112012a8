// ==========================================
// 生产订单追踪系统 - 引擎层错误类型
// ==========================================
// 分类:
// - 操作员可处理: 扫码/迁移被拒绝,原样提示给现场
// - 请求级失败: 工单不存在、超时、冲突、存储错误
// ==========================================

use crate::domain::types::{JobState, StationName};
use crate::repository::error::RepositoryError;
use chrono::Duration;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 扫码校验 =====
    #[error("扫码数据格式错误: {0}")]
    MalformedScan(String),

    #[error("未知工位: {station_id}")]
    UnknownStation { station_id: String },

    #[error("工位已停用: {station_id}")]
    StationInactive { station_id: String },

    #[error(
        "扫码顺序错误: 设备组 {device_group} 第 {expected_ordinal} 步应在 {expected_station} 扫码, 实际工位 {actual_station}"
    )]
    OutOfSequenceScan {
        device_group: String,
        expected_ordinal: u8,
        expected_station: StationName,
        actual_station: StationName,
    },

    #[error("扫码次数已达上限: 设备组 {device_group} 最多 {max_scans} 次")]
    ScanLimitExceeded { device_group: String, max_scans: u8 },

    #[error("停留时间不足: 还需等待 {} 秒", remaining_seconds(.remaining))]
    DwellNotElapsed { remaining: Duration },

    // ===== 状态迁移 =====
    #[error("非法状态迁移: 状态 {from} 不接受 {event}")]
    InvalidTransition { from: JobState, event: String },

    #[error("重试次数已达上限: {retry_count}/{retry_count_max}")]
    RetryLimitExceeded { retry_count: u32, retry_count_max: u32 },

    #[error("无操作权限: 用户 {user_id} 缺少 {capability} 权限")]
    Unauthorized { user_id: String, capability: String },

    // ===== 请求级失败 =====
    #[error("工单不存在: {0}")]
    JobNotFound(String),

    #[error("等待锁超时: {0}")]
    Timeout(String),

    #[error("并发写冲突: {0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl EngineError {
    /// 稳定的机器可读错误码
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::MalformedScan(_) => "MALFORMED_SCAN",
            EngineError::UnknownStation { .. } => "UNKNOWN_STATION",
            EngineError::StationInactive { .. } => "STATION_INACTIVE",
            EngineError::OutOfSequenceScan { .. } => "OUT_OF_SEQUENCE_SCAN",
            EngineError::ScanLimitExceeded { .. } => "SCAN_LIMIT_EXCEEDED",
            EngineError::DwellNotElapsed { .. } => "DWELL_NOT_ELAPSED",
            EngineError::InvalidTransition { .. } => "INVALID_TRANSITION",
            EngineError::RetryLimitExceeded { .. } => "RETRY_LIMIT_EXCEEDED",
            EngineError::Unauthorized { .. } => "UNAUTHORIZED",
            EngineError::JobNotFound(_) => "JOB_NOT_FOUND",
            EngineError::Timeout(_) => "TIMEOUT",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// 是否为操作员可处理的业务拒绝 (其余为请求级失败)
    pub fn is_operator_recoverable(&self) -> bool {
        !matches!(
            self,
            EngineError::JobNotFound(_)
                | EngineError::Timeout(_)
                | EngineError::Conflict(_)
                | EngineError::Storage(_)
        )
    }

    /// 停留时间不足时剩余的秒数 (向上取整)
    pub fn remaining_seconds(&self) -> Option<i64> {
        match self {
            EngineError::DwellNotElapsed { remaining } => Some(remaining_seconds(remaining)),
            _ => None,
        }
    }
}

/// 剩余时长 → 秒 (不足 1 秒按 1 秒计)
pub(crate) fn remaining_seconds(remaining: &Duration) -> i64 {
    let millis = remaining.num_milliseconds().max(0);
    (millis + 999) / 1000
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
