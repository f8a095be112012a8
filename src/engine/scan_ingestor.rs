// ==========================================
// 生产订单追踪系统 - 扫码接入
// ==========================================
// 流程: 解析 → 工位解析 → 序列锁 → 顺序校验 → 停留闸门 → 状态机提交
// 红线: 先完整校验,再写入; 被拒绝的扫码不产生任何副作用
// 红线: 扫码时间由本组件赋值,客户端时间仅留档
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::job::{Job, OrderSummary};
use crate::domain::scan::{ParsedScan, RawScan, ScanEvent, SequenceKey};
use crate::domain::types::ScanType;
use crate::engine::clock::Clock;
use crate::engine::dwell_gate::DwellTimeGate;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::key_lock::KeyedLocks;
use crate::engine::sequence_validator::StationSequenceValidator;
use crate::engine::state_machine::{JobEvent, JobStateMachine, TransitionOrigin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ==========================================
// ScanResult - 扫码结果 (带标签)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanResult {
    #[serde(rename_all = "camelCase")]
    Accepted {
        message: String,
        order_info: OrderSummary,
        ordinal: u8,
    },
    #[serde(rename_all = "camelCase")]
    Rejected {
        code: String,
        message: String,
        remaining_seconds: Option<i64>,
    },
}

impl ScanResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ScanResult::Accepted { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            ScanResult::Accepted { message, .. } | ScanResult::Rejected { message, .. } => message,
        }
    }
}

impl From<EngineError> for ScanResult {
    fn from(err: EngineError) -> Self {
        ScanResult::Rejected {
            code: err.code().to_string(),
            message: err.to_string(),
            remaining_seconds: err.remaining_seconds(),
        }
    }
}

/// 已接受扫码的完整结果
#[derive(Debug, Clone)]
pub struct AcceptedScan {
    pub job: Job,
    pub scan: ScanEvent,
    pub order_info: OrderSummary,
}

impl AcceptedScan {
    pub fn message(&self) -> String {
        format!(
            "{} 扫码成功 (第{}步)",
            self.scan.station_name, self.scan.ordinal
        )
    }
}

// ==========================================
// ScanIngestor
// ==========================================
pub struct ScanIngestor {
    state_machine: Arc<JobStateMachine>,
    validator: StationSequenceValidator,
    clock: Arc<dyn Clock>,
    sequence_locks: KeyedLocks,
}

impl ScanIngestor {
    pub fn new(
        state_machine: Arc<JobStateMachine>,
        validator: StationSequenceValidator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state_machine,
            validator,
            clock,
            sequence_locks: KeyedLocks::new(),
        }
    }

    /// 解析原始扫码
    pub fn parse(raw: &RawScan) -> EngineResult<ParsedScan> {
        let order_id = raw.order_id.trim();
        if order_id.is_empty() {
            return Err(EngineError::MalformedScan("orderId 不能为空".to_string()));
        }
        let station_id = raw.station_id.trim();
        if station_id.is_empty() {
            return Err(EngineError::MalformedScan("stationId 不能为空".to_string()));
        }
        let scan_type = ScanType::parse(&raw.scan_type).ok_or_else(|| {
            EngineError::MalformedScan(format!("未知的 scanType: {}", raw.scan_type))
        })?;

        let part_id = raw
            .part_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        match (scan_type, &part_id) {
            (ScanType::Order, Some(_)) => {
                return Err(EngineError::MalformedScan(
                    "ORDER 扫码不应携带 partId".to_string(),
                ))
            }
            (ScanType::Part, None) => {
                return Err(EngineError::MalformedScan(
                    "PART 扫码缺少 partId".to_string(),
                ))
            }
            _ => {}
        }

        let client_timestamp = match raw.timestamp.as_deref().map(str::trim) {
            Some(ts) if !ts.is_empty() => Some(
                DateTime::parse_from_rfc3339(ts)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| EngineError::MalformedScan(format!("无法解析的时间: {}", ts)))?,
            ),
            _ => None,
        };

        Ok(ParsedScan {
            order_id: order_id.to_string(),
            part_id,
            station_id: station_id.to_string(),
            scan_type,
            client_timestamp,
        })
    }

    /// 接入扫码,返回带标签的结果
    pub fn ingest(&self, raw: &RawScan, config: &EngineConfig) -> ScanResult {
        match self.try_ingest(raw, config) {
            Ok(accepted) => ScanResult::Accepted {
                message: accepted.message(),
                ordinal: accepted.scan.ordinal,
                order_info: accepted.order_info,
            },
            Err(err) => {
                warn!(
                    order_id = %raw.order_id,
                    station_id = %raw.station_id,
                    error_code = err.code(),
                    "扫码被拒绝: {}",
                    err
                );
                err.into()
            }
        }
    }

    /// 接入扫码
    ///
    /// # 错误
    /// 任一校验失败时返回对应错误,且不写入扫码、工单或审计
    pub fn try_ingest(&self, raw: &RawScan, config: &EngineConfig) -> EngineResult<AcceptedScan> {
        // 1. 解析
        let parsed = Self::parse(raw)?;

        // 2. 工位 → 设备组
        let station = config
            .topology
            .station(&parsed.station_id)
            .ok_or_else(|| EngineError::UnknownStation {
                station_id: parsed.station_id.clone(),
            })?;
        if !station.active {
            return Err(EngineError::StationInactive {
                station_id: station.id.clone(),
            });
        }
        let group = config
            .topology
            .device_group(&station.device_group_key)
            .ok_or_else(|| EngineError::UnknownStation {
                station_id: station.id.clone(),
            })?;

        // 同一 (订单, 部件, 设备组) 的校验与写入串行化
        let key = SequenceKey::new(&parsed.order_id, parsed.part_id.as_deref(), &group.key);
        let _guard = self
            .sequence_locks
            .acquire(&key.lock_key(), config.lock_timeout)?;

        // 3. 顺序校验
        let position = self.validator.validate(
            group,
            &parsed.order_id,
            parsed.part_id.as_deref(),
            station.name,
        )?;

        // 4. 停留闸门 (第 2 步)
        let now = self.clock.now();
        if position.ordinal == 2 && group.has_wait_rule {
            if let Some(first_at) = position.step_scanned_at(1) {
                DwellTimeGate::check(group, first_at, now)?;
            }
        }

        // 5. 状态机提交 (扫码 + 工单 + 审计同一事务)
        let scan = ScanEvent {
            id: Uuid::new_v4().to_string(),
            order_id: parsed.order_id.clone(),
            part_id: parsed.part_id.clone(),
            station_id: station.id.clone(),
            station_name: station.name,
            device_group_key: group.key.clone(),
            ordinal: position.ordinal,
            scan_type: parsed.scan_type,
            scanned_at: now,
            client_timestamp: parsed.client_timestamp,
        };
        let origin = TransitionOrigin::Scanner {
            station_id: station.id.clone(),
        };
        let job = self.state_machine.apply(
            &parsed.order_id,
            JobEvent::StationScan {
                scan: scan.clone(),
                max_scans: group.max_scans(),
            },
            &origin,
            config,
        )?;

        // 6. 订单摘要
        let next_station = config.topology.next_station(&group.key, position.ordinal);
        let order_info = OrderSummary::from_job(&job, next_station);

        info!(
            order_id = %scan.order_id,
            part_id = ?scan.part_id,
            station = %scan.station_name,
            device_group = %scan.device_group_key,
            ordinal = scan.ordinal,
            "扫码已接受"
        );

        Ok(AcceptedScan {
            job,
            scan,
            order_info,
        })
    }
}
