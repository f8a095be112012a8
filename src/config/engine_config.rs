// ==========================================
// 生产订单追踪系统 - 引擎配置快照
// ==========================================
// 红线: 快照不可变; 每次调用由调用方显式传入,引擎不读全局状态
// ==========================================

use crate::domain::station::{Topology, DEFAULT_DWELL_MINUTES};
use chrono::Duration;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration as StdDuration;

/// 默认重试上限
pub const DEFAULT_RETRY_COUNT_MAX: u32 = 3;

/// 默认锁等待上限 (毫秒)
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// 默认轮询基础间隔 (毫秒)
pub const DEFAULT_POLL_BASE_INTERVAL_MS: u64 = 5_000;

/// 默认轮询最大间隔 (毫秒)
pub const DEFAULT_POLL_MAX_INTERVAL_MS: u64 = 60_000;

// ==========================================
// PollerConfig - 轮询退避参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub base_interval: StdDuration,
    pub max_interval: StdDuration,
}

impl PollerConfig {
    /// 构造并校正: base 至少 1ms, max 不小于 base
    pub fn new(base_interval: StdDuration, max_interval: StdDuration) -> Self {
        let base_interval = base_interval.max(StdDuration::from_millis(1));
        Self {
            base_interval,
            max_interval: max_interval.max(base_interval),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::new(
            StdDuration::from_millis(DEFAULT_POLL_BASE_INTERVAL_MS),
            StdDuration::from_millis(DEFAULT_POLL_MAX_INTERVAL_MS),
        )
    }
}

// ==========================================
// EngineConfig - 引擎运行参数快照
// ==========================================
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub retry_count_max: u32,
    /// 新建设备组的默认停留时间
    pub default_dwell: Duration,
    /// 按键锁等待上限
    pub lock_timeout: StdDuration,
    pub poller: PollerConfig,
    pub topology: Topology,
}

impl EngineConfig {
    /// 以标准拓扑构造默认配置
    pub fn standard() -> Self {
        let default_dwell = Duration::minutes(DEFAULT_DWELL_MINUTES);
        Self {
            retry_count_max: DEFAULT_RETRY_COUNT_MAX,
            default_dwell,
            lock_timeout: StdDuration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            poller: PollerConfig::default(),
            topology: Topology::standard(default_dwell),
        }
    }

    pub fn with_retry_count_max(mut self, retry_count_max: u32) -> Self {
        self.retry_count_max = retry_count_max;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: StdDuration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }
}

// ==========================================
// ConfigSnapshot - 当前生效的配置
// ==========================================
// 整体替换,不原地修改; 已取出的快照不受后续替换影响
pub struct ConfigSnapshot {
    current: RwLock<Arc<EngineConfig>>,
}

impl ConfigSnapshot {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn current(&self) -> Arc<EngineConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, config: EngineConfig) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }
}
