pub mod service;
pub mod tracing;

pub use service::*;
pub use self::tracing::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("DEBUG"), "debug");
        assert_eq!(normalize_level("INFO"), "info");
        assert_eq!(normalize_level("WARNING"), "warn");
        assert_eq!(normalize_level("CRITICAL"), "error");
        assert_eq!(normalize_level(" error "), "error");
        assert_eq!(normalize_level("aw_api=debug,info"), "aw_api=debug,info");
    }

    #[test]
    fn test_validate_level() {
        assert!(validate_level("DEBUG").is_ok());
        assert!(validate_level("aw_api=trace,info").is_ok());
        assert!(validate_level("aw_api=loud").is_err());
    }

    #[test]
    fn test_counters_are_exposed() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_report("AA:BB", 2);
        metrics.record_sent(5);
        metrics.record_carbon_error();
        metrics.record_alert();

        let text = metrics.render().unwrap();
        assert!(text.contains("aw_reports_total 1"));
        assert!(text.contains("aw_values_skipped_total 2"));
        assert!(text.contains("aw_metrics_sent_total 5"));
        assert!(text.contains("aw_carbon_errors_total 1"));
        assert!(text.contains("aw_alerts_sent_total 1"));
        assert!(text.contains("aw_config_reloads_total 0"));
    }
}
