// ==========================================
// 生产订单追踪系统 - 工单状态机
// ==========================================
// 职责: 持有工单规范状态,应用合法迁移
// 红线: 工单的唯一写入者
// 红线: 每次成功迁移 = 1 次工单写入 + 1 条审计 (+ 扫码事件),同一事务
// 红线: 失败不产生任何写入
// ==========================================
// 并发:
// - 进程内: 按 job_id 的键锁串行化 (等待有上限)
// - 跨进程: revision 条件写入,冲突时重新读取并重算
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::job::{Job, NewJob, OpenSequence};
use crate::domain::scan::ScanEvent;
use crate::domain::types::JobState;
use crate::engine::audit_trail::AuditTrailRecorder;
use crate::engine::clock::Clock;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{JobChangeSource, JobChangedEvent, OptionalEventPublisher};
use crate::engine::key_lock::KeyedLocks;
use crate::repository::error::RepositoryError;
use crate::repository::job_repo::JobRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// 乐观锁冲突后的最大重算次数
const MAX_CONFLICT_ATTEMPTS: usize = 3;

// ==========================================
// JobEvent - 状态机输入事件
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Prepare,
    ImportOpti,
    StartOpti,
    FinishOpti,
    MarkXmlReady,
    Deliver,
    Complete,
    Fail {
        error_code: String,
        error_message: String,
    },
    Hold {
        reason: String,
    },
    Retry,
    Approve,
    /// 已通过顺序/停留校验的扫码; scan 随迁移一并写入
    StationScan {
        scan: ScanEvent,
        max_scans: u8,
    },
}

impl JobEvent {
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Prepare => "Prepare",
            JobEvent::ImportOpti => "ImportOpti",
            JobEvent::StartOpti => "StartOpti",
            JobEvent::FinishOpti => "FinishOpti",
            JobEvent::MarkXmlReady => "MarkXmlReady",
            JobEvent::Deliver => "Deliver",
            JobEvent::Complete => "Complete",
            JobEvent::Fail { .. } => "Fail",
            JobEvent::Hold { .. } => "Hold",
            JobEvent::Retry => "Retry",
            JobEvent::Approve => "Approve",
            JobEvent::StationScan { .. } => "StationScan",
        }
    }

    fn scan(&self) -> Option<&ScanEvent> {
        match self {
            JobEvent::StationScan { scan, .. } => Some(scan),
            _ => None,
        }
    }
}

// ==========================================
// TransitionOrigin - 迁移发起方
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOrigin {
    /// 流水线/系统
    System,
    /// 工位扫码设备
    Scanner { station_id: String },
    /// 人工操作
    Operator { user_id: String },
}

impl TransitionOrigin {
    /// 审计中记录的操作人
    pub fn actor(&self) -> String {
        match self {
            TransitionOrigin::System => "system".to_string(),
            TransitionOrigin::Scanner { station_id } => format!("scanner:{}", station_id),
            TransitionOrigin::Operator { user_id } => user_id.clone(),
        }
    }

    fn change_source(&self) -> JobChangeSource {
        match self {
            TransitionOrigin::System => JobChangeSource::Pipeline,
            TransitionOrigin::Scanner { .. } => JobChangeSource::Scan,
            TransitionOrigin::Operator { .. } => JobChangeSource::Operator,
        }
    }
}

/// 流水线前进边
fn forward_edge(event: &JobEvent) -> Option<(JobState, JobState)> {
    let edge = match event {
        JobEvent::Prepare => (JobState::New, JobState::Prepared),
        JobEvent::ImportOpti => (JobState::Prepared, JobState::OptiImported),
        JobEvent::StartOpti => (JobState::OptiImported, JobState::OptiRunning),
        JobEvent::FinishOpti => (JobState::OptiRunning, JobState::OptiDone),
        JobEvent::MarkXmlReady => (JobState::OptiDone, JobState::XmlReady),
        JobEvent::Deliver => (JobState::XmlReady, JobState::Delivered),
        JobEvent::Complete => (JobState::Delivered, JobState::Done),
        _ => return None,
    };
    Some(edge)
}

/// 可挂起的状态 (NEW..DELIVERED)
fn can_hold(state: JobState) -> bool {
    matches!(
        state,
        JobState::New
            | JobState::Prepared
            | JobState::OptiImported
            | JobState::OptiRunning
            | JobState::OptiDone
            | JobState::XmlReady
            | JobState::Delivered
    )
}

// ==========================================
// JobStateMachine
// ==========================================
pub struct JobStateMachine {
    job_repo: Arc<JobRepository>,
    recorder: Arc<AuditTrailRecorder>,
    clock: Arc<dyn Clock>,
    job_locks: KeyedLocks,
    publisher: OptionalEventPublisher,
}

impl JobStateMachine {
    pub fn new(
        job_repo: Arc<JobRepository>,
        recorder: Arc<AuditTrailRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            job_repo,
            recorder,
            clock,
            job_locks: KeyedLocks::new(),
            publisher: OptionalEventPublisher::none(),
        }
    }

    pub fn with_publisher(mut self, publisher: OptionalEventPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    /// 计算迁移结果 (纯函数,不落库)
    ///
    /// 成功时返回新快照: revision + 1, updated_at = max(now, 旧 updated_at)
    pub fn next(
        job: &Job,
        event: &JobEvent,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> EngineResult<Job> {
        let invalid = || EngineError::InvalidTransition {
            from: job.state,
            event: event.name().to_string(),
        };

        let mut next = job.clone();
        match event {
            JobEvent::Fail {
                error_code,
                error_message,
            } => {
                // 已失败的工单再次失败: 只刷新错误信息
                next.state = JobState::Failed;
                next.error_code = Some(error_code.clone());
                next.error_message = Some(error_message.clone());
            }
            JobEvent::Hold { .. } => {
                if !can_hold(job.state) {
                    return Err(invalid());
                }
                next.state = JobState::Hold;
            }
            JobEvent::Retry => {
                if job.state != JobState::Failed {
                    return Err(invalid());
                }
                if job.retry_count >= config.retry_count_max {
                    return Err(EngineError::RetryLimitExceeded {
                        retry_count: job.retry_count,
                        retry_count_max: config.retry_count_max,
                    });
                }
                next.state = JobState::New;
                next.retry_count += 1;
                next.error_code = None;
                next.error_message = None;
            }
            JobEvent::Approve => {
                if job.state != JobState::Hold {
                    return Err(invalid());
                }
                next.state = JobState::New;
            }
            JobEvent::StationScan { scan, max_scans } => {
                if !job.state.accepts_scans() {
                    return Err(invalid());
                }
                next.current_station = Some(scan.station_name);
                // 只有两步设备组产生进行中序列; 其他序列的扫码不影响它
                if *max_scans > 1 {
                    let open = OpenSequence::new(scan.part_id.as_deref(), &scan.device_group_key);
                    if scan.ordinal == 1 {
                        if !next.open_sequences.contains(&open) {
                            next.open_sequences.push(open);
                        }
                    } else if scan.ordinal >= *max_scans {
                        next.open_sequences.retain(|s| s != &open);
                    }
                }
            }
            _ => match forward_edge(event) {
                Some((from, to)) if from == job.state => next.state = to,
                _ => return Err(invalid()),
            },
        }

        next.revision = job.revision + 1;
        next.updated_at = now.max(job.updated_at);
        Ok(next)
    }

    /// 创建工单 (NEW) 并记录 JOB_CREATED
    pub fn create_job(&self, new_job: NewJob, origin: &TransitionOrigin) -> EngineResult<Job> {
        let job = new_job.into_job(self.clock.now());
        let audit = self.recorder.job_created(&job, origin);

        match self.job_repo.insert_with_audit(&job, &audit) {
            Ok(()) => {}
            Err(RepositoryError::UniqueConstraintViolation(_)) => {
                return Err(EngineError::Conflict(format!("job {} already exists", job.id)));
            }
            Err(e) => return Err(e.into()),
        }

        info!(job_id = %job.id, order_no = %job.order_no, actor = %origin.actor(), "工单已创建");
        self.publisher.publish(JobChangedEvent {
            job_id: job.id.clone(),
            revision: job.revision,
            state: job.state,
            source: origin.change_source(),
        });
        Ok(job)
    }

    /// 读取工单快照
    pub fn get(&self, job_id: &str) -> EngineResult<Job> {
        self.job_repo
            .find_by_id(job_id)?
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))
    }

    /// 应用事件
    ///
    /// # 错误
    /// - `InvalidTransition` / `RetryLimitExceeded`: 工单不变
    /// - `JobNotFound`: 工单不存在
    /// - `Timeout`: 等待工单锁超时
    /// - `Conflict`: 跨进程并发写入冲突,重算 3 次仍失败
    pub fn apply(
        &self,
        job_id: &str,
        event: JobEvent,
        origin: &TransitionOrigin,
        config: &EngineConfig,
    ) -> EngineResult<Job> {
        let _guard = self.job_locks.acquire(job_id, config.lock_timeout)?;

        for attempt in 1..=MAX_CONFLICT_ATTEMPTS {
            let current = self.get(job_id)?;
            let next = match Self::next(&current, &event, config, self.clock.now()) {
                Ok(next) => next,
                Err(e) => {
                    warn!(
                        job_id = %job_id,
                        state = %current.state,
                        event = event.name(),
                        error_code = e.code(),
                        "状态迁移被拒绝"
                    );
                    return Err(e);
                }
            };
            let audit = self.recorder.transition(&current, &next, &event, origin);

            match self
                .job_repo
                .commit_transition(&next, current.revision, event.scan(), &audit)
            {
                Ok(()) => {
                    info!(
                        job_id = %job_id,
                        from = %current.state,
                        to = %next.state,
                        event = event.name(),
                        revision = next.revision,
                        actor = %origin.actor(),
                        "工单迁移已提交"
                    );
                    self.publisher.publish(JobChangedEvent {
                        job_id: next.id.clone(),
                        revision: next.revision,
                        state: next.state,
                        source: origin.change_source(),
                    });
                    return Ok(next);
                }
                Err(RepositoryError::OptimisticLockFailure {
                    expected, actual, ..
                }) => {
                    warn!(
                        job_id = %job_id,
                        attempt,
                        expected,
                        actual,
                        "工单 revision 冲突,重新读取"
                    );
                }
                Err(RepositoryError::NotFound { .. }) => {
                    return Err(EngineError::JobNotFound(job_id.to_string()));
                }
                Err(RepositoryError::UniqueConstraintViolation(msg)) => {
                    warn!(job_id = %job_id, "扫码序号已被占用: {}", msg);
                    return Err(EngineError::Conflict(format!(
                        "scan sequence for job {} was claimed concurrently",
                        job_id
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::Conflict(format!(
            "job {} changed concurrently {} times",
            job_id, MAX_CONFLICT_ATTEMPTS
        )))
    }
}
