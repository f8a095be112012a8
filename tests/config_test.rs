// ==========================================
// 配置快照测试
// ==========================================
// 职责: 验证配置修改经 reload 后整体生效,且不影响已取出的快照
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod config_test {
    use chrono::Duration;
    use order_tracking_engine::api::ApiError;
    use order_tracking_engine::config::config_keys;
    use order_tracking_engine::domain::{device_group_keys, DeviceGroup, StationName};
    use order_tracking_engine::engine::{Actor, Capability, JobEvent};
    use std::time::Duration as StdDuration;

    use crate::test_helpers::{create_test_env, order_scan};

    #[test]
    fn test_retry_limit_follows_reloaded_config() {
        let env = create_test_env();
        env.create_job("J1");
        env.state
            .config_manager
            .set_config_value(config_keys::RETRY_COUNT_MAX, "1")
            .unwrap();
        env.state.reload_config().unwrap();

        let actor = Actor::new("op", &[Capability::RetryJob]);
        let fail = || JobEvent::Fail {
            error_code: "E".to_string(),
            error_message: "boom".to_string(),
        };
        env.state.job_api.advance("J1", fail()).unwrap();
        env.state.job_api.retry("J1", &actor).unwrap();
        env.state.job_api.advance("J1", fail()).unwrap();

        let err = env.state.job_api.retry("J1", &actor).unwrap_err();
        assert!(matches!(err, ApiError::Rejected { ref code, .. } if code == "RETRY_LIMIT_EXCEEDED"));
    }

    #[test]
    fn test_unreloaded_changes_are_not_visible() {
        let env = create_test_env();
        let before = env.state.config.current();

        env.state
            .config_manager
            .set_config_value(config_keys::POLL_BASE_INTERVAL_MS, "250")
            .unwrap();
        assert_eq!(env.state.config.current().poller, before.poller);

        env.state.reload_config().unwrap();
        assert_eq!(
            env.state.config.current().poller.base_interval,
            StdDuration::from_millis(250)
        );
        assert_eq!(before.poller.base_interval, StdDuration::from_secs(5));
    }

    #[test]
    fn test_topology_dwell_change_applies_after_reload() {
        let env = create_test_env();
        env.create_job("O1");

        let group = DeviceGroup::new(
            device_group_keys::EBATLAMA,
            1,
            &[StationName::Hazirlik, StationName::Ebatlama],
        )
        .with_wait_rule(Duration::minutes(5));
        env.state.station_repo.upsert_device_group(&group).unwrap();
        env.state.reload_config().unwrap();

        env.state
            .scan_api
            .post_scan(&order_scan("O1", "ST-HAZIRLIK"))
            .unwrap();
        env.advance(Duration::minutes(5));
        assert!(env
            .state
            .scan_api
            .post_scan(&order_scan("O1", "ST-EBATLAMA"))
            .is_ok());
    }

    #[test]
    fn test_config_snapshot_json() {
        let env = create_test_env();
        env.state
            .config_manager
            .set_config_value(config_keys::LOCK_TIMEOUT_MS, "1500")
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&env.state.config_manager.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(json[config_keys::LOCK_TIMEOUT_MS], "1500");
    }
}
