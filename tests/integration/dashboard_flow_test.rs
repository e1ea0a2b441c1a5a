use pulseboard_core::{
    ChannelSink, DashboardScope, EndpointKind, EndpointProfile, HttpMetricsSource, NullSink,
    PollerSettings, PulseboardConfig, SamplePoller, TickOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_poller(server: &MockServer, profile: &EndpointProfile, capacity: usize) -> SamplePoller {
    let source = HttpMetricsSource::with_timeout(profile.url(&server.uri()), Duration::from_secs(2))
        .unwrap();
    let settings = PollerSettings::for_profile(profile).with_interval(Duration::from_millis(20));
    SamplePoller::for_profile(profile, capacity, Arc::new(source), Arc::new(NullSink), settings)
}

mod monitor_live_flow {
    use super::*;

    #[tokio::test]
    async fn test_live_samples_accumulate_up_to_capacity() {
        let server = MockServer::start().await;
        for (cpu, gpu) in [(10, 20), (15, 25), (12, 22)] {
            Mock::given(method("GET"))
                .and(path("/monitor/live"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(format!(r#"{{"cpu": {}, "gpu": {}}}"#, cpu, gpu)),
                )
                .up_to_n_times(1)
                .expect(1)
                .mount(&server)
                .await;
        }

        let poller = http_poller(&server, &EndpointProfile::monitor_live(), 2);
        for _ in 0..3 {
            assert!(poller.tick().await.is_applied());
        }

        let snapshot = poller.snapshot().await;
        assert_eq!(snapshot.get("cpu").unwrap().values(), &[15.0, 12.0]);
        assert_eq!(snapshot.get("gpu").unwrap().values(), &[25.0, 22.0]);
        assert_eq!(snapshot.get("ram").unwrap().values(), &[0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_requests_bypass_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/monitor/live"))
            .and(header("cache-control", "no-store"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"cpu": 1}"#))
            .expect(1)
            .mount(&server)
            .await;

        let poller = http_poller(&server, &EndpointProfile::monitor_live(), 5);
        assert!(poller.tick().await.is_applied());
    }

    #[tokio::test]
    async fn test_server_error_then_recovery() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"cpu": 33}"#))
            .mount(&server)
            .await;

        let poller = http_poller(&server, &EndpointProfile::monitor_live(), 5);
        match poller.tick().await {
            TickOutcome::Failed(e) => {
                assert_eq!(e.error_code(), "E1004");
                assert!(e.is_transient());
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(poller.snapshot().await.get("cpu").unwrap().is_empty());

        assert!(poller.tick().await.is_applied());
        assert_eq!(poller.snapshot().await.get("cpu").unwrap().values(), &[33.0]);
        assert_eq!(poller.status().await.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"cpu": 1}"#)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let profile = EndpointProfile::monitor_live();
        let source =
            HttpMetricsSource::with_timeout(profile.url(&server.uri()), Duration::from_millis(100))
                .unwrap();
        let poller = SamplePoller::for_profile(
            &profile,
            5,
            Arc::new(source),
            Arc::new(NullSink),
            PollerSettings::for_profile(&profile),
        );

        match poller.tick().await {
            TickOutcome::Failed(e) => assert_eq!(e.error_code(), "E1002"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}

mod run_flow {
    use super::*;

    #[tokio::test]
    async fn test_run_live_history_replaces_windows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/runs/7/live"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status": "running", "metrics": [
                    {"time": "09:00:00", "cpu": 1, "gpu": 2, "ram": 3, "power": 4},
                    {"time": "09:00:01", "cpu": 5, "gpu": 6, "ram": 7, "power": 8},
                    {"time": "09:00:02", "cpu": 9, "gpu": 10, "ram": 11, "power": 12}
                ]}"#,
            ))
            .mount(&server)
            .await;

        let poller = http_poller(&server, &EndpointProfile::run_live("7"), 2);
        match poller.tick().await {
            TickOutcome::Applied { samples, finished } => {
                assert_eq!(samples, 3);
                assert!(!finished);
            }
            other => panic!("expected applied, got {:?}", other),
        }

        poller.tick().await;
        let snapshot = poller.snapshot().await;
        assert_eq!(snapshot.scope, DashboardScope::Run("7".to_string()));
        assert_eq!(snapshot.labels(), &["09:00:01", "09:00:02"]);
        assert_eq!(snapshot.get("power").unwrap().values(), &[8.0, 12.0]);
    }

    #[tokio::test]
    async fn test_metrics_by_run_with_null_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metrics/by_run/3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"ts": "2025-03-01T10:00:00Z", "cpu_util": 20, "gpu_util": null, "mem_used_mb": 1024}]"#,
            ))
            .mount(&server)
            .await;

        let poller = http_poller(&server, &EndpointProfile::metrics_by_run("3"), 10);
        assert!(poller.tick().await.is_applied());

        let snapshot = poller.snapshot().await;
        assert_eq!(snapshot.get("cpu").unwrap().values(), &[20.0]);
        assert_eq!(snapshot.get("gpu").unwrap().values(), &[0.0]);
        assert_eq!(snapshot.get("ram").unwrap().values(), &[1024.0]);
        assert_eq!(snapshot.get("power").unwrap().values(), &[0.0]);
    }

    #[tokio::test]
    async fn test_loop_stops_when_run_finishes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/runs/11/live"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status": "running", "metrics": [{"time": "t0", "cpu": 1}]}"#,
            ))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/runs/11/live"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status": "finished", "metrics": [{"time": "t0", "cpu": 1}, {"time": "t1", "cpu": 2}]}"#,
            ))
            .mount(&server)
            .await;

        let profile = EndpointProfile::run_live("11");
        let source = HttpMetricsSource::new(profile.url(&server.uri())).unwrap();
        let (sink, rx) = ChannelSink::channel();
        let poller = SamplePoller::for_profile(
            &profile,
            20,
            Arc::new(source),
            Arc::new(sink),
            PollerSettings::for_profile(&profile).with_interval(Duration::from_millis(20)),
        );

        poller.start().await;
        tokio::time::timeout(Duration::from_secs(5), poller.join())
            .await
            .expect("poller should stop after the run finishes");

        assert!(!poller.is_running());
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);

        let last = rx.borrow().clone().unwrap();
        assert_eq!(last.get("cpu").unwrap().values(), &[1.0, 2.0]);
    }
}

mod config_flow {
    use super::*;

    #[tokio::test]
    async fn test_config_builds_working_poller() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metrics/by_run/9"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"[{"cpu_util": 70, "gpu_util": 80}]"#),
            )
            .mount(&server)
            .await;

        let mut config = PulseboardConfig::default();
        config.poller.base_url = server.uri();
        config.poller.endpoint = EndpointKind::MetricsByRun;
        config.poller.run_id = Some("9".to_string());
        config.dashboard.capacity = 3;
        config.validate().unwrap();

        let poller = config.build_poller(Arc::new(NullSink)).unwrap();
        assert!(poller.tick().await.is_applied());

        let state = poller.state();
        let state = state.read().await;
        assert_eq!(state.capacity(), 3);
        assert_eq!(state.window("gpu").unwrap().latest().map(|(_, v)| v), Some(80.0));
    }
}
