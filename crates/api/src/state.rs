use aw_alerting::AlertEngine;
use aw_carbon::CarbonSink;
use aw_metrics::MetricsService;
use aw_models::Settings;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<RwLock<Settings>>,
    pub carbon: Arc<dyn CarbonSink>,
    pub alerts: Arc<Mutex<AlertEngine>>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    pub fn new(
        settings: Arc<RwLock<Settings>>,
        carbon: Arc<dyn CarbonSink>,
        alerts: Arc<Mutex<AlertEngine>>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            settings,
            carbon,
            alerts,
            metrics,
        }
    }
}
