use std::path::Path;
use std::process::{Command, Output};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BINARY: &str = env!("CARGO_BIN_EXE_pulseboard");

/// Runs the binary from an empty directory so local config files don't leak in.
fn run_pulseboard_in(dir: &Path, args: &[&str], env_vars: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(BINARY);
    cmd.current_dir(dir)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("PULSEBOARD_BASE_URL")
        .env_remove("PULSEBOARD_INTERVAL_MS")
        .env_remove("PULSEBOARD_LOG_LEVEL")
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env("NO_COLOR", "1");
    for (key, value) in env_vars {
        cmd.env(key, value);
    }
    cmd.output().expect("Failed to execute pulseboard command")
}

fn run_pulseboard(args: &[&str]) -> Output {
    let dir = tempfile::tempdir().unwrap();
    run_pulseboard_in(dir.path(), args, &[])
}

async fn run_pulseboard_async(args: Vec<String>) -> Output {
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_pulseboard(&args)
    })
    .await
    .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

mod version_command_tests {
    use super::*;

    #[test]
    fn test_version_command_basic() {
        let output = run_pulseboard(&["version"]);
        assert!(output.status.success(), "version command should succeed");
        assert!(stdout(&output).contains("pulseboard 0.1.0"));
    }

    #[test]
    fn test_version_command_detailed() {
        let output = run_pulseboard(&["version", "--detailed"]);
        let out = stdout(&output);
        assert!(output.status.success());
        assert!(out.contains("Version"));
        assert!(out.contains("Apache-2.0"));
        assert!(out.contains("/monitor/live"));
    }

    #[test]
    fn test_help_lists_subcommands() {
        let output = run_pulseboard(&["--help"]);
        let out = stdout(&output);
        assert!(output.status.success());
        for sub in ["watch", "once", "config", "version"] {
            assert!(out.contains(sub), "help should mention '{}'", sub);
        }
    }
}

mod config_command_tests {
    use super::*;

    #[test]
    fn test_config_json_shows_defaults() {
        let output = run_pulseboard(&["config", "--format", "json"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
        assert_eq!(value["config"]["dashboard"]["capacity"], 60);
        assert_eq!(value["config"]["poller"]["endpoint"], "monitor_live");
        assert_eq!(value["resolved"]["url"], "http://127.0.0.1:8000/monitor/live");
        assert_eq!(value["resolved"]["mode"], "latest");
        assert_eq!(value["config"]["logging"]["level"], "warn");
    }

    #[test]
    fn test_config_reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pulseboard.toml"),
            "[poller]\nendpoint = \"metrics_by_run\"\nrun_id = \"17\"\n",
        )
        .unwrap();

        let output = run_pulseboard_in(dir.path(), &["config", "--format", "json"], &[]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
        assert_eq!(value["resolved"]["url"], "http://127.0.0.1:8000/metrics/by_run/17");
        assert_eq!(value["resolved"]["mode"], "history");
    }

    #[test]
    fn test_config_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_pulseboard_in(
            dir.path(),
            &["config", "--format", "json"],
            &[("PULSEBOARD_INTERVAL_MS", "250")],
        );
        let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
        assert_eq!(value["config"]["poller"]["interval_ms"], 250);
    }

    #[test]
    fn test_run_endpoint_without_run_id_fails() {
        let output = run_pulseboard(&["config", "--endpoint", "run_live"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("E3002"));
    }

    #[test]
    fn test_unknown_endpoint_is_rejected_by_parser() {
        let output = run_pulseboard(&["once", "--endpoint", "weather"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("weather"));
    }
}

mod poll_command_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_once_prints_json_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/monitor/live"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"cpu": 12.5, "gpu": 40, "ram": 63, "power_gpu_w": 150}"#,
            ))
            .mount(&server)
            .await;

        let output = run_pulseboard_async(vec![
            "once".into(),
            "--base-url".into(),
            server.uri(),
            "--format".into(),
            "json".into(),
        ])
        .await;
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let value: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
        assert_eq!(value["scope"], "live");
        assert_eq!(value["series"]["cpu"]["values"], serde_json::json!([12.5]));
        assert_eq!(value["series"]["power"]["latest"], 150.0);
        assert_eq!(value["series"]["co2_total"]["values"], serde_json::json!([0.0]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_once_reports_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let output = run_pulseboard_async(vec![
            "once".into(),
            "--base-url".into(),
            server.uri(),
        ])
        .await;
        assert!(!output.status.success());
        assert!(stderr(&output).contains("E1004"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watch_with_max_ticks_emits_one_line_per_update() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metrics/by_run/5"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"ts": 1740817800, "cpu_util": 10}, {"ts": 1740817801, "cpu_util": 11}]"#,
            ))
            .expect(3)
            .mount(&server)
            .await;

        let output = run_pulseboard_async(vec![
            "watch".into(),
            "--endpoint".into(),
            "metrics_by_run".into(),
            "--run-id".into(),
            "5".into(),
            "--base-url".into(),
            server.uri(),
            "--interval-ms".into(),
            "20".into(),
            "--max-ticks".into(),
            "3".into(),
            "--format".into(),
            "json".into(),
        ])
        .await;
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let lines: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
        assert_eq!(lines.len(), 3);
        let last: serde_json::Value = serde_json::from_str(&lines[2]).unwrap();
        assert_eq!(last["scope"], "run:5");
        assert_eq!(last["series"]["cpu"]["values"], serde_json::json!([10.0, 11.0]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_once_with_empty_response_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metrics/by_run/2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let output = run_pulseboard_async(vec![
            "once".into(),
            "--endpoint".into(),
            "metrics_by_run".into(),
            "--run-id".into(),
            "2".into(),
            "--base-url".into(),
            server.uri(),
        ])
        .await;
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stderr(&output).contains("no samples"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watch_max_ticks_counts_failed_cycles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let output = run_pulseboard_async(vec![
            "watch".into(),
            "--base-url".into(),
            server.uri(),
            "--interval-ms".into(),
            "20".into(),
            "--max-ticks".into(),
            "2".into(),
            "--format".into(),
            "json".into(),
        ])
        .await;
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stdout(&output).trim().is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    async fn finished_run_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/runs/4/live"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status": "finished", "metrics": [{"time": "t0", "cpu": 1}]}"#,
            ))
            .mount(&server)
            .await;
        server
    }

    fn watch_run_args(server: &MockServer, verbose: bool) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        if verbose {
            args.push("--verbose".into());
        }
        args.extend(
            [
                "watch",
                "--endpoint",
                "run_live",
                "--run-id",
                "4",
                "--format",
                "json",
                "--base-url",
            ]
            .map(String::from),
        );
        args.push(server.uri());
        args
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_default_log_filter_hides_info() {
        let server = finished_run_server().await;

        let output = run_pulseboard_async(watch_run_args(&server, false)).await;
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(!stderr(&output).contains("Poller started"));

        let output = run_pulseboard_async(watch_run_args(&server, true)).await;
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stderr(&output).contains("Poller started"));
    }

    #[test]
    fn test_unreachable_server_fails_once() {
        let output = run_pulseboard(&["once", "--base-url", "http://127.0.0.1:9"]);
        assert!(!output.status.success());
        let err = stderr(&output);
        assert!(err.contains("E1003") || err.contains("E1001"), "stderr: {}", err);
    }
}
