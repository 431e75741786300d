use testflow_monitoring::{init, EditorMetrics, LogExt, MonitorMetrics, MonitoringConfig};

// A single test owns the global subscriber for this binary.
#[test]
fn test_init_installs_subscriber_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = MonitoringConfig {
        service_name: "testflow-test".to_string(),
        log_filter: "debug".to_string(),
        enable_json_logging: true,
        log_file: Some(dir.path().join("testflow.log")),
        environment: "test".to_string(),
    };

    init(config.clone()).unwrap();

    EditorMetrics::record_validation(3, 1);
    EditorMetrics::record_save_plan(1, 0, 2);
    MonitorMetrics::record_event(11, "running", 40);
    MonitorMetrics::record_replay(11, 6, "finished");
    let _ = Err::<(), _>("backend unavailable").log_err("save failed");

    let written: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("testflow.log"))
        .collect();
    assert_eq!(written.len(), 1);

    let second = init(config);
    assert!(second.is_err());
}
