// ==========================================
// 生产订单追踪系统 - 人工操作处理
// ==========================================
// 职责: 重试 (FAILED → NEW)、审批 (HOLD → NEW)
// 红线: 先鉴权,再委托状态机; 审计类型区分人工操作与扫码
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::job::Job;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::state_machine::{JobEvent, JobStateMachine, TransitionOrigin};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

// ==========================================
// 操作人与权限
// ==========================================

/// 操作权限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    RetryJob,
    ApproveJob,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::RetryJob => write!(f, "RETRY_JOB"),
            Capability::ApproveJob => write!(f, "APPROVE_JOB"),
        }
    }
}

/// 发起操作的用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: String,
    #[serde(default)]
    pub capabilities: HashSet<Capability>,
}

impl Actor {
    pub fn new(user_id: &str, capabilities: &[Capability]) -> Self {
        Self {
            user_id: user_id.to_string(),
            capabilities: capabilities.iter().copied().collect(),
        }
    }
}

/// 鉴权接口 (角色/权限由外部系统提供)
pub trait Authorizer: Send + Sync {
    fn authorize(&self, actor: &Actor, capability: Capability) -> EngineResult<()>;
}

/// 基于 Actor 自带权限集合的默认鉴权
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityAuthorizer;

impl Authorizer for CapabilityAuthorizer {
    fn authorize(&self, actor: &Actor, capability: Capability) -> EngineResult<()> {
        if actor.capabilities.contains(&capability) {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                user_id: actor.user_id.clone(),
                capability: capability.to_string(),
            })
        }
    }
}

// ==========================================
// OperatorActionHandler
// ==========================================
pub struct OperatorActionHandler {
    state_machine: Arc<JobStateMachine>,
    authorizer: Arc<dyn Authorizer>,
}

impl OperatorActionHandler {
    pub fn new(state_machine: Arc<JobStateMachine>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            state_machine,
            authorizer,
        }
    }

    /// 重试失败工单
    pub fn retry(&self, job_id: &str, actor: &Actor, config: &EngineConfig) -> EngineResult<Job> {
        self.run(job_id, actor, Capability::RetryJob, JobEvent::Retry, config)
    }

    /// 审批挂起工单
    pub fn approve(&self, job_id: &str, actor: &Actor, config: &EngineConfig) -> EngineResult<Job> {
        self.run(job_id, actor, Capability::ApproveJob, JobEvent::Approve, config)
    }

    fn run(
        &self,
        job_id: &str,
        actor: &Actor,
        capability: Capability,
        event: JobEvent,
        config: &EngineConfig,
    ) -> EngineResult<Job> {
        if let Err(e) = self.authorizer.authorize(actor, capability) {
            warn!(job_id = %job_id, user_id = %actor.user_id, %capability, "人工操作未授权");
            return Err(e);
        }

        let origin = TransitionOrigin::Operator {
            user_id: actor.user_id.clone(),
        };
        let job = self.state_machine.apply(job_id, event, &origin, config)?;
        info!(job_id = %job_id, user_id = %actor.user_id, %capability, "人工操作已执行");
        Ok(job)
    }
}
