// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、手动时钟、事件记录器与测试工单
// ==========================================

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use order_tracking_engine::app::AppState;
use order_tracking_engine::domain::{Job, NewJob, OptiMode, RawScan};
use order_tracking_engine::engine::{
    JobChangedEvent, JobEventPublisher, ManualClock, OptionalEventPublisher,
};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 测试环境
///
/// temp_file 需要保持存活,否则数据库文件会被删除
pub struct TestEnv {
    pub temp_file: NamedTempFile,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub events: Arc<RecordingPublisher>,
}

impl TestEnv {
    /// 推进手动时钟
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// 以固定 ID 创建工单
    pub fn create_job(&self, job_id: &str) -> Job {
        self.state
            .job_api
            .create_job(
                NewJob::new(&format!("ORD-{}", job_id), "ACME", 4, OptiMode::A).with_id(job_id),
            )
            .unwrap()
    }

    pub fn job(&self, job_id: &str) -> Job {
        self.state.job_api.get_job(job_id).unwrap().job
    }
}

/// 记录所有已发布事件
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<JobChangedEvent>>,
}

impl RecordingPublisher {
    pub fn take(&self) -> Vec<JobChangedEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl JobEventPublisher for RecordingPublisher {
    fn publish(&self, event: JobChangedEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// 测试起始时间
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap()
}

/// 创建测试环境: 临时数据库 + 标准拓扑 + 手动时钟
pub fn create_test_env() -> TestEnv {
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let clock = Arc::new(ManualClock::new(t0()));
    let events = Arc::new(RecordingPublisher::default());
    let state = AppState::with_options(
        db_path,
        clock.clone(),
        OptionalEventPublisher::with_publisher(events.clone()),
    )
    .unwrap();

    TestEnv {
        temp_file,
        state,
        clock,
        events,
    }
}

/// 整单扫码
pub fn order_scan(order_id: &str, station_id: &str) -> RawScan {
    RawScan::order(order_id, station_id)
}

/// 部件扫码
pub fn part_scan(order_id: &str, part_id: &str, station_id: &str) -> RawScan {
    RawScan::part(order_id, part_id, station_id)
}
