use aw_models::{AwError, MetricValue, Threshold};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::alert::{Alert, AlertKind};
use crate::notifier::Notifier;
use crate::state::{AlertState, StateStore, LAST_LOAD_KEY};

/// Tracks whether each metric is past its threshold and notifies on transitions.
///
/// The first value seen for a metric only establishes its status. After
/// that, a flip to alerting sends a problem notice and a flip back sends a
/// recovery notice. If sending fails the stored status is left alone, so the
/// next report tries the same transition again.
pub struct AlertEngine {
    thresholds: BTreeMap<String, Threshold>,
    state: AlertState,
    store: StateStore,
    notifier: Arc<dyn Notifier>,
}

impl AlertEngine {
    pub fn new(
        thresholds: BTreeMap<String, Threshold>,
        state: AlertState,
        store: StateStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            thresholds,
            state,
            store,
            notifier,
        }
    }

    /// Loads prior state from `store` before building the engine.
    pub async fn load(
        thresholds: BTreeMap<String, Threshold>,
        store: StateStore,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AwError> {
        let state = store.load().await?;
        Ok(Self::new(thresholds, state, store, notifier))
    }

    pub fn set_thresholds(&mut self, thresholds: BTreeMap<String, Threshold>) {
        self.thresholds = thresholds;
    }

    /// Swaps in a reloaded config. The state is written to `store` first and
    /// nothing changes if that write fails.
    pub async fn reconfigure(
        &mut self,
        thresholds: BTreeMap<String, Threshold>,
        notifier: Arc<dyn Notifier>,
        store: StateStore,
        loaded_at: f64,
    ) -> Result<(), AwError> {
        let mut state = self.state.clone();
        state.last_load_ts = Some(loaded_at);
        store.save(&state).await?;

        if store.path() != self.store.path() {
            info!("Alert state moved to {}", store.path().display());
        }
        self.state = state;
        self.thresholds = thresholds;
        self.notifier = notifier;
        self.store = store;
        Ok(())
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn is_alerting(&self, metric: &str) -> Option<bool> {
        self.state.alerts.get(metric).copied()
    }

    pub fn record_config_load(&mut self, ts: f64) {
        self.state.last_load_ts = Some(ts);
    }

    /// Returns the alert that was sent, if the metric changed status.
    #[instrument(skip(self))]
    pub async fn evaluate(&mut self, metric: &str, value: MetricValue) -> Result<Option<Alert>, AwError> {
        if metric == LAST_LOAD_KEY {
            debug!("Ignoring reserved metric name {}", metric);
            return Ok(None);
        }
        let threshold = self.thresholds.get(metric);
        let is_alerting = threshold.map(|t| t.is_breached(value.as_f64())).unwrap_or(false);

        let previous = self.state.alerts.get(metric).copied();
        let sent = match previous {
            Some(was_alerting) if was_alerting != is_alerting => {
                debug!(
                    "Metric {} alert state was {} and is now {}",
                    metric, was_alerting, is_alerting
                );
                let alert = Alert {
                    kind: if is_alerting { AlertKind::Problem } else { AlertKind::Recovery },
                    metric: metric.to_string(),
                    value,
                    threshold: threshold.and_then(|t| t.threshold),
                };
                self.notifier.notify(&alert).await?;
                Some(alert)
            }
            _ => None,
        };

        self.state.alerts.insert(metric.to_string(), is_alerting);
        Ok(sent)
    }

    pub async fn persist(&self) -> Result<(), AwError> {
        self.store.save(&self.state).await
    }
}
