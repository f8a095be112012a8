// ==========================================
// 生产订单追踪系统 - 工单 API
// ==========================================
// 接口:
// - POST job/{id}/retry, POST job/{id}/approve → 工单快照
// - GET job/{id} → {job, audit[]} (audit 旧 → 新)
// - 工单创建、流水线事件推进、列表查询
// ==========================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::config::engine_config::ConfigSnapshot;
use crate::domain::audit::AuditEvent;
use crate::domain::job::{Job, NewJob};
use crate::domain::types::JobState;
use crate::engine::audit_trail::AuditTrailRecorder;
use crate::engine::operator_actions::{Actor, OperatorActionHandler};
use crate::engine::state_machine::{JobEvent, JobStateMachine, TransitionOrigin};
use crate::repository::job_repo::JobRepository;

/// 默认列表条数
const DEFAULT_LIST_LIMIT: i32 = 100;

/// 工单详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub job: Job,
    /// 审计历史 (旧 → 新)
    pub audit: Vec<AuditEvent>,
}

// ==========================================
// JobApi
// ==========================================
pub struct JobApi {
    job_repo: Arc<JobRepository>,
    state_machine: Arc<JobStateMachine>,
    operator_actions: Arc<OperatorActionHandler>,
    recorder: Arc<AuditTrailRecorder>,
    config: Arc<ConfigSnapshot>,
}

impl JobApi {
    pub fn new(
        job_repo: Arc<JobRepository>,
        state_machine: Arc<JobStateMachine>,
        operator_actions: Arc<OperatorActionHandler>,
        recorder: Arc<AuditTrailRecorder>,
        config: Arc<ConfigSnapshot>,
    ) -> Self {
        Self {
            job_repo,
            state_machine,
            operator_actions,
            recorder,
            config,
        }
    }

    fn validate_job_id(job_id: &str) -> ApiResult<()> {
        if job_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("工单ID不能为空".to_string()));
        }
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 查询工单详情
    pub fn get_job(&self, job_id: &str) -> ApiResult<JobDetail> {
        Self::validate_job_id(job_id)?;
        let job = self.state_machine.get(job_id)?;
        let audit = self.recorder.history(job_id)?;
        Ok(JobDetail { job, audit })
    }

    /// 工单列表 (最近更新在前)
    pub fn list_jobs(&self, state: Option<JobState>, limit: Option<i32>) -> ApiResult<Vec<Job>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 1000);
        let jobs = match state {
            Some(state) => self.job_repo.list_by_state(state, limit)?,
            None => self.job_repo.list_recent(limit)?,
        };
        Ok(jobs)
    }

    // ==========================================
    // 人工操作
    // ==========================================

    /// 重试失败工单
    pub fn retry(&self, job_id: &str, actor: &Actor) -> ApiResult<Job> {
        Self::validate_job_id(job_id)?;
        let config = self.config.current();
        Ok(self.operator_actions.retry(job_id, actor, &config)?)
    }

    /// 审批挂起工单
    pub fn approve(&self, job_id: &str, actor: &Actor) -> ApiResult<Job> {
        Self::validate_job_id(job_id)?;
        let config = self.config.current();
        Ok(self.operator_actions.approve(job_id, actor, &config)?)
    }

    // ==========================================
    // 工单生命周期
    // ==========================================

    /// 创建工单
    pub fn create_job(&self, new_job: NewJob) -> ApiResult<Job> {
        if new_job.order_no.trim().is_empty() {
            return Err(ApiError::InvalidInput("订单号不能为空".to_string()));
        }
        Ok(self
            .state_machine
            .create_job(new_job, &TransitionOrigin::System)?)
    }

    /// 推进流水线事件 (Prepare/ImportOpti/.../Fail/Hold)
    ///
    /// 扫码事件只能经由扫码接口提交
    pub fn advance(&self, job_id: &str, event: JobEvent) -> ApiResult<Job> {
        Self::validate_job_id(job_id)?;
        if matches!(event, JobEvent::StationScan { .. }) {
            return Err(ApiError::InvalidInput(
                "扫码事件必须通过扫码接口提交".to_string(),
            ));
        }
        let config = self.config.current();
        Ok(self
            .state_machine
            .apply(job_id, event, &TransitionOrigin::System, &config)?)
    }
}
