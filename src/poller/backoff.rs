// ==========================================
// 生产订单追踪系统 - 轮询退避
// ==========================================
// 规则:
// - 成功: 间隔重置为 base
// - 失败: 间隔 = min(间隔 * 2, max)
// ==========================================

use crate::config::engine_config::PollerConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    config: PollerConfig,
    interval: Duration,
}

impl Backoff {
    pub fn new(config: PollerConfig) -> Self {
        Self {
            interval: config.base_interval,
            config,
        }
    }

    /// 当前间隔
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 记录一次成功,返回下次等待时长
    pub fn on_success(&mut self) -> Duration {
        self.interval = self.config.base_interval;
        self.interval
    }

    /// 记录一次失败,返回下次等待时长
    pub fn on_failure(&mut self) -> Duration {
        self.interval = self
            .interval
            .saturating_mul(2)
            .min(self.config.max_interval);
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PollerConfig {
        PollerConfig::new(Duration::from_secs(5), Duration::from_secs(60))
    }

    #[test]
    fn test_failures_double_until_max() {
        let mut backoff = Backoff::new(config());
        let delays: Vec<u64> = (0..6).map(|_| backoff.on_failure().as_secs()).collect();
        assert_eq!(delays, vec![10, 20, 40, 60, 60, 60]);
    }

    #[test]
    fn test_success_resets_to_base() {
        let mut backoff = Backoff::new(config());
        backoff.on_failure();
        backoff.on_failure();
        assert_eq!(backoff.on_success(), Duration::from_secs(5));
        assert_eq!(backoff.interval(), Duration::from_secs(5));
    }
}
