use aw_alerting::{AlertEngine, AlertKind, AlertState, StateStore};
use aw_models::{MetricValue, Operator, Threshold};
use aw_testsupport::RecordingNotifier;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::tempdir;

fn thresholds() -> BTreeMap<String, Threshold> {
    [
        ("tempf".to_string(), Threshold::new(Operator::Lt, 32.0)),
        ("battout".to_string(), Threshold::new(Operator::Ne, 1.0)),
    ]
    .into_iter()
    .collect()
}

fn engine(dir: &tempfile::TempDir, notifier: Arc<RecordingNotifier>) -> AlertEngine {
    AlertEngine::new(
        thresholds(),
        AlertState::default(),
        StateStore::new(dir.path().join("state.json")),
        notifier,
    )
}

#[tokio::test]
async fn first_observation_only_sets_state() {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let mut engine = engine(&dir, notifier.clone());

    let sent = engine.evaluate("tempf", MetricValue::Float(20.0)).await.unwrap();
    assert!(sent.is_none());
    assert_eq!(engine.is_alerting("tempf"), Some(true));
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn transitions_send_problem_then_recovery() {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let mut engine = engine(&dir, notifier.clone());

    engine.evaluate("tempf", MetricValue::Float(40.0)).await.unwrap();
    let problem = engine.evaluate("tempf", MetricValue::Float(31.0)).await.unwrap().unwrap();
    assert_eq!(problem.kind, AlertKind::Problem);
    assert_eq!(problem.threshold, Some(32.0));

    // still alerting, nothing new
    assert!(engine.evaluate("tempf", MetricValue::Float(30.0)).await.unwrap().is_none());

    let recovery = engine.evaluate("tempf", MetricValue::Int(35)).await.unwrap().unwrap();
    assert_eq!(recovery.kind, AlertKind::Recovery);

    let subjects: Vec<String> = notifier.sent().iter().map(|a| a.subject()).collect();
    assert_eq!(subjects, vec!["[PROBLEM] tempf", "[RECOVERY] tempf"]);
}

#[tokio::test]
async fn unconfigured_metric_is_never_alerting() {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let mut engine = engine(&dir, notifier.clone());

    engine.evaluate("humidity", MetricValue::Int(99)).await.unwrap();
    engine.evaluate("humidity", MetricValue::Int(100)).await.unwrap();
    assert_eq!(engine.is_alerting("humidity"), Some(false));
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn removing_a_threshold_recovers_the_metric() {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let mut engine = engine(&dir, notifier.clone());

    engine.evaluate("battout", MetricValue::Int(0)).await.unwrap();
    assert_eq!(engine.is_alerting("battout"), Some(true));

    engine.set_thresholds(BTreeMap::new());
    let sent = engine.evaluate("battout", MetricValue::Int(0)).await.unwrap().unwrap();
    assert_eq!(sent.kind, AlertKind::Recovery);
    assert_eq!(sent.threshold, None);
}

#[tokio::test]
async fn failed_notification_is_retried_on_next_report() {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let mut engine = engine(&dir, notifier.clone());

    engine.evaluate("battout", MetricValue::Int(1)).await.unwrap();

    notifier.set_failing(true);
    assert!(engine.evaluate("battout", MetricValue::Int(0)).await.is_err());
    assert_eq!(engine.is_alerting("battout"), Some(false));

    notifier.set_failing(false);
    let sent = engine.evaluate("battout", MetricValue::Int(0)).await.unwrap().unwrap();
    assert_eq!(sent.kind, AlertKind::Problem);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn state_survives_a_restart() {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    {
        let mut engine = engine(&dir, notifier.clone());
        engine.evaluate("tempf", MetricValue::Float(10.0)).await.unwrap();
        engine.record_config_load(1_700_000_000.0);
        engine.persist().await.unwrap();
    }

    let restored = AlertEngine::load(
        thresholds(),
        StateStore::new(dir.path().join("state.json")),
        notifier.clone(),
    )
    .await
    .unwrap();
    assert_eq!(restored.is_alerting("tempf"), Some(true));
    assert_eq!(restored.state().last_load_ts, Some(1_700_000_000.0));

    let mut restored = restored;
    let sent = restored.evaluate("tempf", MetricValue::Float(50.0)).await.unwrap().unwrap();
    assert_eq!(sent.kind, AlertKind::Recovery);
}

#[tokio::test]
async fn reserved_key_in_a_report_does_not_break_the_state_file() {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    {
        let mut engine = engine(&dir, notifier.clone());
        engine.record_config_load(1_700_000_000.0);
        let sent = engine.evaluate("last_load_ts", MetricValue::Int(5)).await.unwrap();
        assert!(sent.is_none());
        engine.evaluate("tempf", MetricValue::Float(10.0)).await.unwrap();
        engine.persist().await.unwrap();
    }

    let restored = AlertEngine::load(
        thresholds(),
        StateStore::new(dir.path().join("state.json")),
        notifier,
    )
    .await
    .unwrap();
    assert_eq!(restored.state().last_load_ts, Some(1_700_000_000.0));
    assert_eq!(restored.is_alerting("last_load_ts"), None);
    assert_eq!(restored.is_alerting("tempf"), Some(true));
}

#[tokio::test]
async fn reconfigure_writes_to_the_new_store() {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let mut engine = engine(&dir, notifier.clone());
    engine.evaluate("tempf", MetricValue::Float(10.0)).await.unwrap();

    let moved = dir.path().join("moved").join("alerts.json");
    engine
        .reconfigure(BTreeMap::new(), notifier, StateStore::new(&moved), 1_700_000_100.0)
        .await
        .unwrap();
    assert_eq!(engine.store_path(), moved.as_path());

    let saved = StateStore::new(&moved).load().await.unwrap();
    assert_eq!(saved.last_load_ts, Some(1_700_000_100.0));
    assert_eq!(saved.alerts.get("tempf"), Some(&true));
}

#[tokio::test]
async fn failed_reconfigure_changes_nothing() {
    let dir = tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let mut engine = engine(&dir, notifier.clone());
    engine.record_config_load(1_700_000_000.0);

    // a regular file where the state directory should be
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let err = engine
        .reconfigure(
            BTreeMap::new(),
            notifier,
            StateStore::new(blocker.join("state.json")),
            1_700_000_100.0,
        )
        .await;
    assert!(err.is_err());

    assert_eq!(engine.store_path(), dir.path().join("state.json").as_path());
    assert_eq!(engine.state().last_load_ts, Some(1_700_000_000.0));
    // thresholds were kept, so tempf still alerts below 32
    engine.evaluate("tempf", MetricValue::Float(10.0)).await.unwrap();
    assert_eq!(engine.is_alerting("tempf"), Some(true));
}
