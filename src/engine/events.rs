// ==========================================
// 生产订单追踪系统 - 工单变更事件发布
// ==========================================
// 职责: 迁移提交后通知下游 (读模型刷新、推送)
// 说明: Engine 层定义 trait,外层实现适配器
// 红线: 发布发生在事务提交之后; 发布失败不回滚已提交的迁移
// ==========================================

use crate::domain::types::JobState;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 工单变更事件
// ==========================================

/// 变更来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobChangeSource {
    /// 流水线/系统事件
    Pipeline,
    /// 工位扫码
    Scan,
    /// 人工操作
    Operator,
}

/// 已提交的工单快照变更
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobChangedEvent {
    pub job_id: String,
    pub revision: i64,
    pub state: JobState,
    pub source: JobChangeSource,
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 工单事件发布者
pub trait JobEventPublisher: Send + Sync {
    fn publish(&self, event: JobChangedEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl JobEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: JobChangedEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            job_id = %event.job_id,
            revision = event.revision,
            "NoOpEventPublisher: 跳过事件发布"
        );
        Ok(())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn JobEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn JobEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件; 失败只记录日志
    pub fn publish(&self, event: JobChangedEvent) {
        let Some(publisher) = &self.inner else {
            return;
        };
        let job_id = event.job_id.clone();
        if let Err(e) = publisher.publish(event) {
            tracing::warn!(job_id = %job_id, error = %e, "工单变更事件发布失败");
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<JobChangedEvent>>);

    impl JobEventPublisher for Recording {
        fn publish(&self, event: JobChangedEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct Failing;

    impl JobEventPublisher for Failing {
        fn publish(&self, _event: JobChangedEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("downstream unavailable".into())
        }
    }

    fn event() -> JobChangedEvent {
        JobChangedEvent {
            job_id: "O1".to_string(),
            revision: 3,
            state: JobState::Prepared,
            source: JobChangeSource::Pipeline,
        }
    }

    #[test]
    fn test_optional_publisher_forwards() {
        let recording = Arc::new(Recording::default());
        let publisher = OptionalEventPublisher::with_publisher(recording.clone());
        assert!(publisher.is_configured());

        publisher.publish(event());
        assert_eq!(recording.0.lock().unwrap().as_slice(), &[event()]);
    }

    #[test]
    fn test_publish_failure_is_swallowed() {
        let publisher = OptionalEventPublisher::with_publisher(Arc::new(Failing));
        publisher.publish(event());
        assert!(!OptionalEventPublisher::none().is_configured());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(event()).unwrap();
        assert_eq!(json["jobId"], "O1");
        assert_eq!(json["state"], "PREPARED");
        assert_eq!(json["source"], "PIPELINE");
        assert!(NoOpEventPublisher.publish(event()).is_ok());
    }
}
