// ==========================================
// 生产订单追踪系统 - 审计轨迹记录器
// ==========================================
// 职责: 为每次状态迁移/扫码构建不可变的审计事件; 查询审计历史
// 红线: 审计事件与工单写入在同一事务追加 (JobRepository::commit_transition)
// 红线: 不提供修改/删除
// ==========================================

use crate::domain::audit::{AuditEvent, AuditEventType};
use crate::domain::job::Job;
use crate::engine::error::EngineResult;
use crate::engine::state_machine::{JobEvent, TransitionOrigin};
use crate::repository::audit_event_repo::AuditEventRepository;
use serde_json::json;
use std::sync::Arc;

// ==========================================
// AuditTrailRecorder
// ==========================================
pub struct AuditTrailRecorder {
    repo: Arc<AuditEventRepository>,
}

impl AuditTrailRecorder {
    pub fn new(repo: Arc<AuditEventRepository>) -> Self {
        Self { repo }
    }

    /// 工单创建审计
    pub fn job_created(&self, job: &Job, origin: &TransitionOrigin) -> AuditEvent {
        AuditEvent::new(
            &job.id,
            AuditEventType::JobCreated,
            format!("工单创建: {} ({})", job.order_no, job.customer),
            job.created_at,
        )
        .with_details(&json!({
            "actor": origin.actor(),
            "orderNo": job.order_no,
            "partCount": job.part_count,
            "optiMode": job.opti_mode,
        }))
    }

    /// 状态迁移/扫码审计
    ///
    /// # 参数
    /// - `before`: 迁移前快照
    /// - `after`: 迁移后快照 (created_at 取 after.updated_at)
    pub fn transition(
        &self,
        before: &Job,
        after: &Job,
        event: &JobEvent,
        origin: &TransitionOrigin,
    ) -> AuditEvent {
        let event_type = Self::event_type(event, origin);

        let message = match event {
            JobEvent::StationScan { scan, .. } => format!(
                "扫码通过: {} ({} 第{}步)",
                scan.station_name, scan.device_group_key, scan.ordinal
            ),
            JobEvent::Fail { error_code, error_message } => format!(
                "工单失败: {} → FAILED [{}] {}",
                before.state, error_code, error_message
            ),
            JobEvent::Hold { reason } => {
                format!("工单挂起: {} → HOLD ({})", before.state, reason)
            }
            JobEvent::Retry => format!(
                "重试: FAILED → NEW (第 {} 次)",
                after.retry_count
            ),
            JobEvent::Approve => "审批通过: HOLD → NEW".to_string(),
            _ => format!("状态变更: {} → {}", before.state, after.state),
        };

        let mut details = json!({
            "actor": origin.actor(),
            "event": event.name(),
            "from": before.state,
            "to": after.state,
            "revision": after.revision,
        });
        if let JobEvent::StationScan { scan, .. } = event {
            details["scanId"] = json!(scan.id);
            details["stationId"] = json!(scan.station_id);
            details["deviceGroup"] = json!(scan.device_group_key);
            details["ordinal"] = json!(scan.ordinal);
            details["partId"] = json!(scan.part_id);
        }
        if let JobEvent::Retry = event {
            details["retryCount"] = json!(after.retry_count);
        }

        AuditEvent::new(&after.id, event_type, message, after.updated_at).with_details(&details)
    }

    fn event_type(event: &JobEvent, origin: &TransitionOrigin) -> AuditEventType {
        let by_operator = matches!(origin, TransitionOrigin::Operator { .. });
        match event {
            JobEvent::StationScan { .. } => AuditEventType::ScanAccepted,
            JobEvent::Fail { .. } => AuditEventType::JobFailed,
            JobEvent::Hold { .. } => AuditEventType::JobHeld,
            JobEvent::Retry if by_operator => AuditEventType::OperatorRetry,
            JobEvent::Approve if by_operator => AuditEventType::OperatorApprove,
            _ => AuditEventType::StateChanged,
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 工单审计历史 (旧 → 新)
    pub fn history(&self, job_id: &str) -> EngineResult<Vec<AuditEvent>> {
        Ok(self.repo.find_by_job_id(job_id)?)
    }

    /// 最近的审计事件 (新 → 旧)
    pub fn recent(&self, limit: i32) -> EngineResult<Vec<AuditEvent>> {
        Ok(self.repo.find_recent(limit)?)
    }
}
