// ==========================================
// 生产订单追踪系统 - 按键互斥锁注册表
// ==========================================
// 职责: 以字符串键 (工单ID / 扫码序列键) 为粒度串行化写入
// 红线: 等待有上限,超时返回 EngineError::Timeout,绝不无限阻塞
// 红线: 无全局锁; 不同键之间互不影响
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Default)]
struct Slot {
    held: Mutex<bool>,
    released: Condvar,
}

// ==========================================
// KeyedLocks - 锁注册表
// ==========================================
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Arc<Slot>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 获取键上的互斥锁
    ///
    /// # 错误
    /// - `Timeout`: 在 `timeout` 内未能获得锁
    pub fn acquire(&self, key: &str, timeout: Duration) -> EngineResult<KeyGuard<'_>> {
        let slot = self
            .slots()
            .entry(key.to_string())
            .or_default()
            .clone();

        let deadline = Instant::now() + timeout;
        let acquired = {
            let mut held = slot.held.lock().unwrap_or_else(PoisonError::into_inner);
            loop {
                if !*held {
                    *held = true;
                    break true;
                }
                let now = Instant::now();
                if now >= deadline {
                    break false;
                }
                held = slot
                    .released
                    .wait_timeout(held, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        };

        if !acquired {
            self.forget(key, slot);
            debug!(lock_key = key, timeout_ms = timeout.as_millis() as u64, "等待锁超时");
            return Err(EngineError::Timeout(format!(
                "lock {} not acquired within {}ms",
                key,
                timeout.as_millis()
            )));
        }

        Ok(KeyGuard {
            locks: self,
            key: key.to_string(),
            slot: Some(slot),
        })
    }

    /// 释放对槽位的引用; 无人持有/等待时从注册表移除
    fn forget(&self, key: &str, slot: Arc<Slot>) {
        let mut slots = self.slots();
        drop(slot);
        let idle = slots
            .get(key)
            .map(|s| Arc::strong_count(s) == 1)
            .unwrap_or(false);
        if idle {
            slots.remove(key);
        }
    }

    /// 当前注册的键数量
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ==========================================
// KeyGuard - 持锁凭证 (Drop 时释放)
// ==========================================
pub struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
    slot: Option<Arc<Slot>>,
}

impl KeyGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            {
                let mut held = slot.held.lock().unwrap_or_else(PoisonError::into_inner);
                *held = false;
            }
            slot.released.notify_all();
            self.locks.forget(&self.key, slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_second_acquire_times_out_while_held() {
        let locks = KeyedLocks::new();
        let _guard = locks.acquire("O1", Duration::from_millis(50)).unwrap();

        let result = locks.acquire("O1", Duration::from_millis(20));
        assert!(matches!(result, Err(EngineError::Timeout(_))));
    }

    #[test]
    fn test_different_keys_do_not_contend() {
        let locks = KeyedLocks::new();
        let _a = locks.acquire("O1", Duration::from_millis(10)).unwrap();
        let b = locks.acquire("O2", Duration::from_millis(10)).unwrap();
        assert_eq!(b.key(), "O2");
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_registry_is_cleaned_after_release() {
        let locks = KeyedLocks::new();
        {
            let _guard = locks.acquire("O1", Duration::from_millis(10)).unwrap();
        }
        assert!(locks.is_empty());

        let _held = locks.acquire("O1", Duration::from_millis(10)).unwrap();
        let _ = locks.acquire("O1", Duration::from_millis(5));
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_waiter_acquires_after_release() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let _guard = locks.acquire("O1", Duration::from_secs(5)).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }
}
