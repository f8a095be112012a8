// ==========================================
// 生产订单追踪系统 - 读模型轮询器
// ==========================================
// 状态: Idle / Scheduled
// 流程: 启动即拉取; 成功 → 间隔重置; 失败 → 间隔翻倍并上报错误,循环不停止
// 红线: stop() 返回后不再有任何回调; 定时器句柄由调用方持有,无全局定时器
// 红线: 只用于读取,从不重试写操作
// ==========================================

pub mod backoff;
pub mod job_source;

pub use backoff::Backoff;
pub use job_source::JobSnapshotSource;

use crate::config::engine_config::PollerConfig;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// ==========================================
// 数据源与回调
// ==========================================

/// 轮询数据源
#[async_trait]
pub trait PollSource: Send + Sync + 'static {
    type Item: Send + 'static;

    async fn fetch(&self) -> anyhow::Result<Self::Item>;
}

/// 每次拉取后的通知
#[derive(Debug, Clone, PartialEq)]
pub enum PollUpdate<T> {
    Data { value: T, next_poll_in: Duration },
    Failed { message: String, next_poll_in: Duration },
}

impl<T> PollUpdate<T> {
    pub fn next_poll_in(&self) -> Duration {
        match self {
            PollUpdate::Data { next_poll_in, .. } | PollUpdate::Failed { next_poll_in, .. } => {
                *next_poll_in
            }
        }
    }
}

/// 轮询器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerStatus {
    Idle,
    Scheduled { interval: Duration },
}

type Sink<T> = Box<dyn Fn(PollUpdate<T>) + Send + Sync>;

struct PollerShared<T> {
    sink: Mutex<Option<Sink<T>>>,
    status: Mutex<PollerStatus>,
}

impl<T> PollerShared<T> {
    /// 投递通知; 已停止则丢弃
    ///
    /// 回调在 sink 锁内执行,stop() 取走 sink 时会等待进行中的回调结束
    fn deliver(&self, update: PollUpdate<T>) -> bool {
        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match sink.as_ref() {
            Some(callback) => {
                callback(update);
                true
            }
            None => false,
        }
    }

    fn set_status(&self, status: PollerStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn status(&self) -> PollerStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ==========================================
// ResilientPoller
// ==========================================
pub struct ResilientPoller;

impl ResilientPoller {
    /// 启动轮询 (需在 tokio 运行时内调用)
    pub fn start<S, F>(source: S, config: PollerConfig, sink: F) -> anyhow::Result<PollerHandle<S::Item>>
    where
        S: PollSource,
        F: Fn(PollUpdate<S::Item>) + Send + Sync + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| anyhow::anyhow!("轮询器需要 tokio 运行时: {}", e))?;

        let shared = Arc::new(PollerShared {
            sink: Mutex::new(Some(Box::new(sink) as Sink<S::Item>)),
            status: Mutex::new(PollerStatus::Scheduled {
                interval: config.base_interval,
            }),
        });

        let task = runtime.spawn(run_loop(source, config, Arc::clone(&shared)));
        Ok(PollerHandle {
            shared,
            task: Some(task),
        })
    }
}

async fn run_loop<S: PollSource>(source: S, config: PollerConfig, shared: Arc<PollerShared<S::Item>>) {
    let mut backoff = Backoff::new(config);

    loop {
        let update = match source.fetch().await {
            Ok(value) => PollUpdate::Data {
                value,
                next_poll_in: backoff.on_success(),
            },
            Err(e) => {
                let next_poll_in = backoff.on_failure();
                warn!(
                    error = %e,
                    retry_in_ms = next_poll_in.as_millis() as u64,
                    "轮询拉取失败,退避重试"
                );
                PollUpdate::Failed {
                    message: e.to_string(),
                    next_poll_in,
                }
            }
        };

        let delay = update.next_poll_in();
        if !shared.deliver(update) {
            debug!("轮询器已停止,丢弃结果");
            return;
        }
        shared.set_status(PollerStatus::Scheduled { interval: delay });
        tokio::time::sleep(delay).await;
    }
}

// ==========================================
// PollerHandle - 轮询句柄 (Drop 即停止)
// ==========================================
pub struct PollerHandle<T> {
    shared: Arc<PollerShared<T>>,
    task: Option<JoinHandle<()>>,
}

impl<T> PollerHandle<T> {
    pub fn status(&self) -> PollerStatus {
        self.shared.status()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// 停止轮询
    ///
    /// 返回后不会再有回调执行; 进行中的拉取结果被丢弃
    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.shared
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        task.abort();
        self.shared.set_status(PollerStatus::Idle);
        debug!("轮询器已停止");
    }
}

impl<T> Drop for PollerHandle<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
