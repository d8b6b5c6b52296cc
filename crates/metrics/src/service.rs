use aw_models::AwError;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use tracing::debug;

pub struct MetricsService {
    registry: Registry,
    reports_total: IntCounter,
    metrics_sent_total: IntCounter,
    values_skipped_total: IntCounter,
    carbon_errors_total: IntCounter,
    alerts_sent_total: IntCounter,
    alert_failures_total: IntCounter,
    config_reloads_total: IntCounter,
}

fn internal(e: impl ToString) -> AwError {
    AwError::InternalError { reason: e.to_string() }
}

impl MetricsService {
    pub fn new() -> Result<Self, AwError> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| -> Result<IntCounter, AwError> {
            let c = IntCounter::new(name, help).map_err(internal)?;
            registry.register(Box::new(c.clone())).map_err(internal)?;
            Ok(c)
        };

        let reports_total = counter("aw_reports_total", "Station reports received")?;
        let metrics_sent_total = counter("aw_metrics_sent_total", "Datapoints written to Carbon")?;
        let values_skipped_total = counter(
            "aw_values_skipped_total",
            "Report fields dropped because they were not numeric",
        )?;
        let carbon_errors_total = counter("aw_carbon_errors_total", "Failed Carbon deliveries")?;
        let alerts_sent_total = counter("aw_alerts_sent_total", "Alert notifications sent")?;
        let alert_failures_total = counter(
            "aw_alert_failures_total",
            "Alert notifications that could not be sent",
        )?;
        let config_reloads_total = counter("aw_config_reloads_total", "Successful config reloads")?;

        Ok(Self {
            registry,
            reports_total,
            metrics_sent_total,
            values_skipped_total,
            carbon_errors_total,
            alerts_sent_total,
            alert_failures_total,
            config_reloads_total,
        })
    }

    pub fn record_report(&self, station: &str, skipped: usize) {
        self.reports_total.inc();
        self.values_skipped_total.inc_by(skipped as u64);
        debug!("Recorded report for station: {}", station);
    }

    pub fn record_sent(&self, lines: usize) {
        self.metrics_sent_total.inc_by(lines as u64);
    }

    pub fn record_carbon_error(&self) {
        self.carbon_errors_total.inc();
    }

    pub fn record_alert(&self) {
        self.alerts_sent_total.inc();
    }

    pub fn record_alert_failure(&self) {
        self.alert_failures_total.inc();
    }

    pub fn record_config_reload(&self) {
        self.config_reloads_total.inc();
    }

    pub fn render(&self) -> Result<String, AwError> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();

        encoder.encode(&metric_families, &mut buffer).map_err(internal)?;

        String::from_utf8(buffer).map_err(internal)
    }
}
