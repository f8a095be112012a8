// ==========================================
// 生产订单追踪系统 - 工单快照数据源
// ==========================================

use crate::api::job_api::{JobApi, JobDetail};
use crate::poller::PollSource;
use async_trait::async_trait;
use std::sync::Arc;

/// 轮询单个工单的详情 (工单 + 审计)
pub struct JobSnapshotSource {
    api: Arc<JobApi>,
    job_id: String,
}

impl JobSnapshotSource {
    pub fn new(api: Arc<JobApi>, job_id: impl Into<String>) -> Self {
        Self {
            api,
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

#[async_trait]
impl PollSource for JobSnapshotSource {
    type Item = JobDetail;

    async fn fetch(&self) -> anyhow::Result<JobDetail> {
        // 仓储为同步 SQLite 访问,放到阻塞线程池执行
        let api = Arc::clone(&self.api);
        let job_id = self.job_id.clone();
        let detail = tokio::task::spawn_blocking(move || api.get_job(&job_id)).await??;
        Ok(detail)
    }
}
