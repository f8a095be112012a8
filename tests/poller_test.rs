// ==========================================
// 工单轮询测试
// ==========================================
// 职责: 验证 watch_job 拉取工单快照、失败退避、停止后无回调
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod poller_test {
    use order_tracking_engine::config::config_keys;
    use order_tracking_engine::engine::JobEvent;
    use order_tracking_engine::poller::{PollUpdate, PollerStatus};
    use std::time::Duration;
    use tokio::sync::mpsc;

    use crate::test_helpers::{create_test_env, TestEnv};

    fn fast_polling(env: &TestEnv) {
        let manager = &env.state.config_manager;
        manager
            .set_config_value(config_keys::POLL_BASE_INTERVAL_MS, "20")
            .unwrap();
        manager
            .set_config_value(config_keys::POLL_MAX_INTERVAL_MS, "80")
            .unwrap();
        env.state.reload_config().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_watch_job_sees_new_revision() {
        let env = create_test_env();
        fast_polling(&env);
        env.create_job("W1");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = env
            .state
            .watch_job("W1", move |update| {
                let _ = tx.send(update);
            })
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match first {
            PollUpdate::Data { value, next_poll_in } => {
                assert_eq!(value.job.revision, 0);
                assert_eq!(next_poll_in, Duration::from_millis(20));
            }
            other => panic!("unexpected update: {:?}", other),
        }

        env.state.job_api.advance("W1", JobEvent::Prepare).unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(update) = rx.recv().await {
                if let PollUpdate::Data { value, .. } = update {
                    if value.job.revision == 1 {
                        return value;
                    }
                }
            }
            panic!("poller channel closed");
        })
        .await
        .unwrap();
        assert_eq!(seen.audit.len(), 2);

        handle.stop();
        assert_eq!(handle.status(), PollerStatus::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_missing_job_backs_off_to_max() {
        let env = create_test_env();
        fast_polling(&env);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = env
            .state
            .watch_job("MISSING", move |update| {
                let _ = tx.send(update);
            })
            .unwrap();

        let mut delays = Vec::new();
        while delays.len() < 4 {
            let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(update, PollUpdate::Failed { .. }));
            delays.push(update.next_poll_in().as_millis());
        }
        assert_eq!(delays, vec![40, 80, 80, 80]);

        handle.stop();
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }
}
