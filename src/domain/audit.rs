// ==========================================
// 生产订单追踪系统 - 审计事件领域模型
// ==========================================
// 红线: 所有状态变更/扫码必须记录, 审计记录只追加不修改
// 用途: 制造追溯 (法规要求)
// 对齐: audit_event 表
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ==========================================
// AuditEvent - 审计事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: String,
    pub job_id: String,
    pub event_type: String,            // 存储为字符串
    pub message: String,               // 人类可读描述
    pub details_json: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// AuditEventType - 审计事件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    JobCreated,      // 工单创建
    StateChanged,    // 流水线阶段推进
    JobFailed,       // 工单失败
    JobHeld,         // 工单挂起
    ScanAccepted,    // 扫码被接受
    OperatorRetry,   // 人工重试
    OperatorApprove, // 人工审批
}

impl AuditEventType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::JobCreated => "JOB_CREATED",
            AuditEventType::StateChanged => "STATE_CHANGED",
            AuditEventType::JobFailed => "JOB_FAILED",
            AuditEventType::JobHeld => "JOB_HELD",
            AuditEventType::ScanAccepted => "SCAN_ACCEPTED",
            AuditEventType::OperatorRetry => "OPERATOR_RETRY",
            AuditEventType::OperatorApprove => "OPERATOR_APPROVE",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "JOB_CREATED" => Some(AuditEventType::JobCreated),
            "STATE_CHANGED" => Some(AuditEventType::StateChanged),
            "JOB_FAILED" => Some(AuditEventType::JobFailed),
            "JOB_HELD" => Some(AuditEventType::JobHeld),
            "SCAN_ACCEPTED" => Some(AuditEventType::ScanAccepted),
            "OPERATOR_RETRY" => Some(AuditEventType::OperatorRetry),
            "OPERATOR_APPROVE" => Some(AuditEventType::OperatorApprove),
            _ => None,
        }
    }

    /// 是否为人工发起的操作
    pub fn is_operator_action(&self) -> bool {
        matches!(
            self,
            AuditEventType::OperatorRetry | AuditEventType::OperatorApprove
        )
    }
}

impl AuditEvent {
    /// 创建新的审计事件
    pub fn new(
        job_id: &str,
        event_type: AuditEventType,
        message: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            event_type: event_type.as_str().to_string(),
            message,
            details_json: None,
            created_at,
        }
    }

    /// 设置详情 (转换为JSON)
    pub fn with_details<T: Serialize>(mut self, details: &T) -> Self {
        self.details_json = serde_json::to_value(details).ok();
        self
    }

    pub fn kind(&self) -> Option<AuditEventType> {
        AuditEventType::from_str(&self.event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_round_trip() {
        for t in [
            AuditEventType::JobCreated,
            AuditEventType::StateChanged,
            AuditEventType::JobFailed,
            AuditEventType::JobHeld,
            AuditEventType::ScanAccepted,
            AuditEventType::OperatorRetry,
            AuditEventType::OperatorApprove,
        ] {
            assert_eq!(AuditEventType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(AuditEventType::from_str("Import"), None);
    }

    #[test]
    fn test_with_details() {
        let event = AuditEvent::new(
            "O1",
            AuditEventType::OperatorRetry,
            "重试".to_string(),
            Utc::now(),
        )
        .with_details(&serde_json::json!({ "actor": "supervisor-1" }));

        assert_eq!(event.kind(), Some(AuditEventType::OperatorRetry));
        assert!(event.kind().unwrap().is_operator_action());
        assert_eq!(event.details_json.unwrap()["actor"], "supervisor-1");
    }
}
