// ==========================================
// 扫码工作流场景测试
// ==========================================
// 职责: 端到端验证 顺序校验 / 停留闸门 / 扫码上限 / 拒绝无副作用
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod workflow_scenarios_test {
    use chrono::Duration;
    use order_tracking_engine::api::ApiError;
    use order_tracking_engine::domain::{AuditEventType, JobState, OpenSequence, StationName};
    use order_tracking_engine::engine::{JobChangeSource, JobEvent};

    use crate::test_helpers::{create_test_env, order_scan, part_scan, t0};

    fn rejected_code(err: ApiError) -> (String, Option<i64>) {
        match err {
            ApiError::Rejected {
                code,
                remaining_seconds,
                ..
            } => (code, remaining_seconds),
            other => panic!("期望业务拒绝, 实际: {:?}", other),
        }
    }

    // ==========================================
    // 两步设备组 + 停留时间
    // ==========================================

    #[test]
    fn test_ebatlama_dwell_gate_scenario() {
        let env = create_test_env();
        env.create_job("O1");
        let api = &env.state.scan_api;

        // t=0: HAZIRLIK 第 1 步
        let first = api.post_scan(&order_scan("O1", "ST-HAZIRLIK")).unwrap();
        let info = first.order_info.unwrap();
        assert_eq!(info.current_station, Some(StationName::Hazirlik));
        assert_eq!(info.next_station, Some(StationName::Ebatlama));
        let job = env.job("O1");
        assert!(job.is_in_process());
        assert_eq!(
            job.open_sequences,
            vec![OpenSequence::new(None, "EBATLAMA_DEVICE")]
        );

        // t=10min: 停留不足
        env.advance(Duration::minutes(10));
        let err = api.post_scan(&order_scan("O1", "ST-EBATLAMA")).unwrap_err();
        let (code, remaining) = rejected_code(err);
        assert_eq!(code, "DWELL_NOT_ELAPSED");
        assert_eq!(remaining, Some(20 * 60));

        // t=31min: 第 2 步通过,设备组完成
        env.advance(Duration::minutes(21));
        let second = api.post_scan(&order_scan("O1", "ST-EBATLAMA")).unwrap();
        assert!(second.message.contains("第2步"));
        let job = env.job("O1");
        assert_eq!(job.current_station, Some(StationName::Ebatlama));
        assert!(!job.is_in_process());
        assert_eq!(job.state, JobState::New);
    }

    #[test]
    fn test_dwell_boundary_is_inclusive() {
        let env = create_test_env();
        env.create_job("O1");
        let api = &env.state.scan_api;

        api.post_scan(&order_scan("O1", "ST-HAZIRLIK")).unwrap();
        env.advance(Duration::minutes(30));
        assert!(api.post_scan(&order_scan("O1", "ST-EBATLAMA")).is_ok());
    }

    #[test]
    fn test_second_step_before_first_is_out_of_sequence() {
        let env = create_test_env();
        env.create_job("O1");

        let err = env
            .state
            .scan_api
            .post_scan(&order_scan("O1", "ST-EBATLAMA"))
            .unwrap_err();
        assert_eq!(rejected_code(err).0, "OUT_OF_SEQUENCE_SCAN");
    }

    // ==========================================
    // 单步设备组
    // ==========================================

    #[test]
    fn test_single_step_group_scan_limit() {
        let env = create_test_env();
        env.create_job("O2");
        let api = &env.state.scan_api;

        let first = api.post_scan(&order_scan("O2", "ST-BANTLAMA")).unwrap();
        assert!(first.message.contains("第1步"));
        assert!(!env.job("O2").is_in_process());

        let err = api.post_scan(&order_scan("O2", "ST-BANTLAMA")).unwrap_err();
        assert_eq!(rejected_code(err).0, "SCAN_LIMIT_EXCEEDED");
    }

    #[test]
    fn test_teslim_group_has_no_dwell() {
        let env = create_test_env();
        env.create_job("O3");
        let api = &env.state.scan_api;

        api.post_scan(&order_scan("O3", "ST-KONTROL")).unwrap();
        let done = api.post_scan(&order_scan("O3", "ST-TESLIMAT")).unwrap();
        assert_eq!(done.order_info.unwrap().next_station, None);
    }

    // ==========================================
    // 进行中标记按序列独立维护
    // ==========================================

    #[test]
    fn test_single_step_scan_keeps_open_sequence() {
        let env = create_test_env();
        env.create_job("O1");
        let api = &env.state.scan_api;

        api.post_scan(&order_scan("O1", "ST-HAZIRLIK")).unwrap();
        api.post_scan(&order_scan("O1", "ST-BANTLAMA")).unwrap();

        let job = env.job("O1");
        assert_eq!(job.current_station, Some(StationName::Bantlama));
        assert!(job.is_in_process());
        assert_eq!(
            job.open_sequences,
            vec![OpenSequence::new(None, "EBATLAMA_DEVICE")]
        );

        env.advance(Duration::minutes(31));
        api.post_scan(&order_scan("O1", "ST-EBATLAMA")).unwrap();
        assert!(!env.job("O1").is_in_process());
    }

    #[test]
    fn test_other_part_scan_keeps_open_sequence() {
        let env = create_test_env();
        env.create_job("O1");
        let api = &env.state.scan_api;

        api.post_scan(&part_scan("O1", "P1", "ST-HAZIRLIK")).unwrap();
        api.post_scan(&part_scan("O1", "P2", "ST-BANTLAMA")).unwrap();

        let job = env.job("O1");
        assert!(job.is_part_in_process(Some("P1")));
        assert!(!job.is_part_in_process(Some("P2")));
        assert!(!job.is_part_in_process(None));

        // 另一序列的两步设备组开闭不影响 P1
        api.post_scan(&order_scan("O1", "ST-KONTROL")).unwrap();
        api.post_scan(&order_scan("O1", "ST-TESLIMAT")).unwrap();
        let job = env.job("O1");
        assert_eq!(
            job.open_sequences,
            vec![OpenSequence::new(Some("P1"), "EBATLAMA_DEVICE")]
        );

        env.advance(Duration::minutes(30));
        api.post_scan(&part_scan("O1", "P1", "ST-EBATLAMA")).unwrap();
        assert!(env.job("O1").open_sequences.is_empty());
    }

    // ==========================================
    // 拒绝不产生副作用
    // ==========================================

    #[test]
    fn test_rejected_scan_leaves_snapshot_unchanged() {
        let env = create_test_env();
        env.create_job("O1");
        let api = &env.state.scan_api;

        api.post_scan(&order_scan("O1", "ST-HAZIRLIK")).unwrap();
        let before = env.state.job_api.get_job("O1").unwrap();
        env.events.take();

        env.advance(Duration::minutes(5));
        assert!(api.post_scan(&order_scan("O1", "ST-EBATLAMA")).is_err());
        assert!(api.post_scan(&order_scan("O1", "ST-UNKNOWN")).is_err());
        assert!(api.post_scan(&order_scan("O1", "ST-HAZIRLIK")).is_err());

        let after = env.state.job_api.get_job("O1").unwrap();
        assert_eq!(before, after);
        assert!(env.events.take().is_empty());
    }

    #[test]
    fn test_unknown_and_inactive_station() {
        let env = create_test_env();
        env.create_job("O1");

        let err = env
            .state
            .scan_api
            .post_scan(&order_scan("O1", "ST-UNKNOWN"))
            .unwrap_err();
        assert_eq!(rejected_code(err).0, "UNKNOWN_STATION");

        env.state
            .station_repo
            .set_station_active("ST-BANTLAMA", false)
            .unwrap();
        env.state.reload_config().unwrap();

        let err = env
            .state
            .scan_api
            .post_scan(&order_scan("O1", "ST-BANTLAMA"))
            .unwrap_err();
        assert_eq!(rejected_code(err).0, "STATION_INACTIVE");
    }

    #[test]
    fn test_unknown_order_is_not_found() {
        let env = create_test_env();

        let err = env
            .state
            .scan_api
            .post_scan(&order_scan("MISSING", "ST-HAZIRLIK"))
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let tagged = env
            .state
            .scan_api
            .post_scan_tagged(&order_scan("MISSING", "ST-HAZIRLIK"));
        assert!(!tagged.is_accepted());
    }

    #[test]
    fn test_scan_rejected_in_terminal_and_blocked_states() {
        let env = create_test_env();
        env.create_job("O1");
        env.state
            .job_api
            .advance(
                "O1",
                JobEvent::Hold {
                    reason: "材料短缺".to_string(),
                },
            )
            .unwrap();

        let err = env
            .state
            .scan_api
            .post_scan(&order_scan("O1", "ST-BANTLAMA"))
            .unwrap_err();
        assert_eq!(rejected_code(err).0, "INVALID_TRANSITION");
    }

    #[test]
    fn test_malformed_json_request() {
        let env = create_test_env();

        let err = env.state.scan_api.post_scan_json("{not json").unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        let err = env
            .state
            .scan_api
            .post_scan_json(r#"{"orderId":"O1","stationId":"ST-HAZIRLIK","scanType":"PALLET"}"#)
            .unwrap_err();
        assert_eq!(rejected_code(err).0, "MALFORMED_SCAN");
    }

    // ==========================================
    // 部件扫码: 每个部件独立序列
    // ==========================================

    #[test]
    fn test_part_scans_have_independent_sequences() {
        let env = create_test_env();
        env.create_job("O4");
        let api = &env.state.scan_api;

        api.post_scan(&part_scan("O4", "P1", "ST-BANTLAMA")).unwrap();
        api.post_scan(&part_scan("O4", "P2", "ST-BANTLAMA")).unwrap();
        api.post_scan(&order_scan("O4", "ST-BANTLAMA")).unwrap();

        let err = api
            .post_scan(&part_scan("O4", "P1", "ST-BANTLAMA"))
            .unwrap_err();
        assert_eq!(rejected_code(err).0, "SCAN_LIMIT_EXCEEDED");
    }

    // ==========================================
    // 审计与事件
    // ==========================================

    #[test]
    fn test_accepted_scan_writes_one_audit_and_one_event() {
        let env = create_test_env();
        env.create_job("O1");
        env.events.take();

        env.state
            .scan_api
            .post_scan(&order_scan("O1", "ST-HAZIRLIK"))
            .unwrap();

        let detail = env.state.job_api.get_job("O1").unwrap();
        let kinds: Vec<_> = detail.audit.iter().map(|a| a.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                Some(AuditEventType::JobCreated),
                Some(AuditEventType::ScanAccepted)
            ]
        );
        assert_eq!(detail.audit[1].created_at, t0());

        let events = env.events.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].job_id, "O1");
        assert_eq!(events[0].revision, detail.job.revision);
        assert_eq!(events[0].source, JobChangeSource::Scan);
    }

    #[test]
    fn test_pipeline_walk_to_done() {
        let env = create_test_env();
        env.create_job("O5");
        let api = &env.state.job_api;

        for event in [
            JobEvent::Prepare,
            JobEvent::ImportOpti,
            JobEvent::StartOpti,
            JobEvent::FinishOpti,
            JobEvent::MarkXmlReady,
            JobEvent::Deliver,
            JobEvent::Complete,
        ] {
            api.advance("O5", event).unwrap();
        }

        let detail = api.get_job("O5").unwrap();
        assert_eq!(detail.job.state, JobState::Done);
        assert_eq!(detail.job.revision, 7);
        assert_eq!(detail.audit.len(), 8);

        let done = api.list_jobs(Some(JobState::Done), None).unwrap();
        assert_eq!(done.len(), 1);
    }
}
