use aw_alerting::{build_notifier, AlertEngine, StateStore};
use aw_carbon::{CarbonEndpoint, CarbonSink};
use aw_metrics::{validate_level, LogLevelHandle, MetricsService};
use aw_models::{AwError, ConfigChange, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument, warn};

/// Re-reads the config file when it changes and pushes the new values into
/// the running components.
pub struct ConfigWatcher {
    path: PathBuf,
    settings: Arc<RwLock<Settings>>,
    carbon: Arc<dyn CarbonSink>,
    alerts: Arc<Mutex<AlertEngine>>,
    metrics: Arc<MetricsService>,
    log_level: Option<LogLevelHandle>,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    pub fn new(
        path: PathBuf,
        settings: Arc<RwLock<Settings>>,
        carbon: Arc<dyn CarbonSink>,
        alerts: Arc<Mutex<AlertEngine>>,
        metrics: Arc<MetricsService>,
        log_level: Option<LogLevelHandle>,
    ) -> Self {
        let last_modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        Self {
            path,
            settings,
            carbon,
            alerts,
            metrics,
            log_level,
            last_modified,
        }
    }

    /// Polls the file forever. An interval of zero turns reloading off.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn start(mut self) {
        loop {
            let secs = self.settings.read().await.reload_interval_secs;
            if secs == 0 {
                info!("Config reload disabled");
                return;
            }
            tokio::time::sleep(Duration::from_secs(secs)).await;

            if !self.file_changed().await {
                continue;
            }
            if let Err(e) = self.reload().await {
                error!("Config reload failed, keeping previous settings: {}", e);
            }
        }
    }

    async fn file_changed(&mut self) -> bool {
        let modified = match tokio::fs::metadata(&self.path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Cannot stat {}: {}", self.path.display(), e);
                return false;
            }
        };
        if self.last_modified == Some(modified) {
            return false;
        }
        self.last_modified = Some(modified);
        true
    }

    /// Loads the file and applies it. Returns the keys that changed.
    ///
    /// Everything that can fail runs before any component is touched, so an
    /// error leaves the previous settings in force.
    pub async fn reload(&mut self) -> Result<Vec<ConfigChange>, AwError> {
        info!("Loading config now");
        let loaded_at = unix_now();
        let new = Settings::load(&self.path)?;
        if let Some(level) = &new.loglevel {
            validate_level(level)?;
        }

        let changes = {
            let current = self.settings.read().await;
            new.diff(&current)
        };

        self.alerts
            .lock()
            .await
            .reconfigure(
                new.alert_thresholds.clone(),
                build_notifier(&new),
                StateStore::new(new.state_file.clone()),
                loaded_at,
            )
            .await?;

        log_changes(&changes, false);
        if let (Some(handle), Some(level)) = (&self.log_level, &new.loglevel) {
            if let Err(e) = handle.set(level) {
                warn!("Keeping previous log level: {}", e);
            }
        }
        self.carbon.reconfigure(CarbonEndpoint::from_settings(&new));

        *self.settings.write().await = new;
        self.metrics.record_config_reload();
        Ok(changes)
    }
}

/// Logs each change and returns the logged lines. On startup every key is
/// new, so only the log level is worth mentioning.
pub fn log_changes(changes: &[ConfigChange], startup: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for change in changes {
        if startup && change.key != "LOGLEVEL" {
            continue;
        }
        if change.is_structured() {
            lines.push(format!("Config item {} changed from:", change.key));
            lines.push(serde_json::to_string_pretty(&change.old).unwrap_or_default());
            lines.push("to:".to_string());
            lines.push(serde_json::to_string_pretty(&change.new).unwrap_or_default());
        } else {
            lines.push(format!(
                "Config item {} changed from {} to {}",
                change.key, change.old, change.new
            ));
        }
    }
    for line in &lines {
        info!("{}", line);
    }
    lines
}

pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aw_models::{Operator, Threshold};

    #[test]
    fn test_startup_only_logs_loglevel() {
        let mut settings = Settings::default();
        settings.carbon_server = "graphite.lan".to_string();
        settings.loglevel = Some("DEBUG".to_string());

        let lines = log_changes(&settings.diff(&Settings::default()), true);
        assert_eq!(lines, vec![r#"Config item LOGLEVEL changed from null to "DEBUG""#]);
    }

    #[test]
    fn test_reload_logs_every_change() {
        let mut settings = Settings::default();
        settings.carbon_port = 2004;
        settings
            .alert_thresholds
            .insert("tempf".to_string(), Threshold::new(Operator::Lt, 32.0));

        let lines = log_changes(&settings.diff(&Settings::default()), false);
        assert_eq!(lines[0], "Config item ALERT_THRESHOLDS changed from:");
        assert_eq!(lines[1], "{}");
        assert_eq!(lines[2], "to:");
        assert!(lines[3].contains("\"tempf\""));
        assert_eq!(lines[4], "Config item CARBON_PORT changed from 2003 to 2004");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_nothing_logged_without_changes() {
        assert!(log_changes(&[], true).is_empty());
        assert!(log_changes(&Settings::default().diff(&Settings::default()), false).is_empty());
    }
}
