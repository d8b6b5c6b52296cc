use aw_alerting::{build_notifier, AlertEngine, StateStore};
use aw_api::AppState;
use aw_carbon::{CarbonEndpoint, CarbonSink, TcpCarbonSink};
use aw_metrics::{LogLevelHandle, MetricsService};
use aw_models::{AwError, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::watcher::{log_changes, unix_now, ConfigWatcher};

/// Everything the server needs, wired from one settings snapshot.
pub struct Service {
    pub state: AppState,
    pub watcher: ConfigWatcher,
}

impl Service {
    /// Builds the components and restores alert state from disk.
    pub async fn build(
        config_path: PathBuf,
        settings: Settings,
        log_level: Option<LogLevelHandle>,
    ) -> Result<Self, AwError> {
        log_changes(&settings.diff(&Settings::default()), true);

        let carbon: Arc<dyn CarbonSink> =
            Arc::new(TcpCarbonSink::new(CarbonEndpoint::from_settings(&settings)));
        let metrics = Arc::new(MetricsService::new()?);

        let store = StateStore::new(settings.state_file.clone());
        let mut engine = AlertEngine::load(
            settings.alert_thresholds.clone(),
            store,
            build_notifier(&settings),
        )
        .await?;
        engine.record_config_load(unix_now());
        engine.persist().await?;
        info!(
            "Alert state loaded from {} ({} metrics tracked)",
            settings.state_file.display(),
            engine.state().alerts.len()
        );
        let alerts = Arc::new(Mutex::new(engine));

        let settings = Arc::new(RwLock::new(settings));
        let watcher = ConfigWatcher::new(
            config_path,
            settings.clone(),
            carbon.clone(),
            alerts.clone(),
            metrics.clone(),
            log_level,
        );

        Ok(Self {
            state: AppState::new(settings, carbon, alerts, metrics),
            watcher,
        })
    }
}
