// ==========================================
// 生产订单追踪系统 - 工单领域模型
// ==========================================
// 红线: 工单只由 JobStateMachine 写入,创建后不删除
// 对齐: job 表
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{JobState, OptiMode, StationName};

// ==========================================
// Job - 工单 (即订单)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    // ===== 主键 =====
    pub id: String,

    // ===== 订单信息 (扫码结果展示用) =====
    pub order_no: String,
    pub customer: String,
    pub part_count: u32,

    // ===== 工作流状态 =====
    pub state: JobState,
    pub retry_count: u32,
    pub error_code: Option<String>,    // 仅 FAILED 时存在
    pub error_message: Option<String>, // 仅 FAILED 时存在
    pub opti_mode: OptiMode,

    // ===== 工位进度 =====
    pub current_station: Option<StationName>, // 最近一次被接受的扫码工位
    pub open_sequences: Vec<OpenSequence>,    // 已扫第 1 步、等待第 2 步的序列

    // ===== 并发控制 =====
    pub revision: i64,

    // ===== 时间戳 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// 是否有任一序列处于加工中 (已完成第 1 次扫码,等待第 2 次)
    pub fn is_in_process(&self) -> bool {
        !self.open_sequences.is_empty()
    }

    /// 指定部件 (None = 整单) 是否有未完成的两步设备组
    pub fn is_part_in_process(&self, part_id: Option<&str>) -> bool {
        self.open_sequences
            .iter()
            .any(|s| s.part_id.as_deref() == part_id)
    }
}

// ==========================================
// OpenSequence - 进行中的两步设备组序列
// ==========================================
// 工单内以 (part, device group) 区分; 订单由所属工单确定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSequence {
    #[serde(default)]
    pub part_id: Option<String>,
    pub device_group_key: String,
}

impl OpenSequence {
    pub fn new(part_id: Option<&str>, device_group_key: &str) -> Self {
        Self {
            part_id: part_id.map(str::to_string),
            device_group_key: device_group_key.to_string(),
        }
    }
}

// ==========================================
// NewJob - 工单创建参数
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    /// 为空时自动生成 UUID
    pub id: Option<String>,
    pub order_no: String,
    pub customer: String,
    pub part_count: u32,
    pub opti_mode: OptiMode,
}

impl NewJob {
    pub fn new(order_no: &str, customer: &str, part_count: u32, opti_mode: OptiMode) -> Self {
        Self {
            id: None,
            order_no: order_no.to_string(),
            customer: customer.to_string(),
            part_count,
            opti_mode,
        }
    }

    /// 指定工单ID (条码中的 orderId)
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// 生成处于 NEW 状态的工单
    pub fn into_job(self, now: DateTime<Utc>) -> Job {
        Job {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            order_no: self.order_no,
            customer: self.customer,
            part_count: self.part_count,
            state: JobState::New,
            retry_count: 0,
            error_code: None,
            error_message: None,
            opti_mode: self.opti_mode,
            current_station: None,
            open_sequences: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// OrderSummary - 扫码后展示的订单摘要
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: String,
    pub order_no: String,
    pub customer: String,
    pub part_count: u32,
    pub state: JobState,
    pub current_station: Option<StationName>,
    pub next_station: Option<StationName>,
}

impl OrderSummary {
    pub fn from_job(job: &Job, next_station: Option<StationName>) -> Self {
        Self {
            order_id: job.id.clone(),
            order_no: job.order_no.clone(),
            customer: job.customer.clone(),
            part_count: job.part_count,
            state: job.state,
            current_station: job.current_station,
            next_station,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_starts_in_new_state() {
        let now = Utc::now();
        let job = NewJob::new("SIP-001", "ACME", 4, OptiMode::B)
            .with_id("O1")
            .into_job(now);

        assert_eq!(job.id, "O1");
        assert_eq!(job.state, JobState::New);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.revision, 0);
        assert_eq!(job.created_at, job.updated_at);
        assert!(job.error_code.is_none());
        assert!(!job.is_in_process());
    }

    #[test]
    fn test_blank_id_is_generated() {
        let job = NewJob::new("SIP-002", "ACME", 1, OptiMode::A)
            .with_id("  ")
            .into_job(Utc::now());
        assert!(Uuid::parse_str(&job.id).is_ok());
    }

    #[test]
    fn test_job_serializes_state_vocabulary() {
        let job = NewJob::new("SIP-003", "ACME", 2, OptiMode::C).into_job(Utc::now());
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["state"], "NEW");
        assert_eq!(value["optiMode"], "C");
        assert_eq!(value["retryCount"], 0);
    }
}
