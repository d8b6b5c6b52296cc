use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use aw_carbon::lines_for;
use aw_models::{ErrorShape, StationReport};
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument};

use crate::AppState;

/// What happened to one report, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    pub lines_sent: usize,
    pub carbon_failed: bool,
    pub alerts_sent: usize,
    pub alert_failures: usize,
}

/// Custom-server push from a station: `GET /?PASSKEY=..&dateutc=..&tempf=..`.
///
/// Carbon and mail failures are logged and counted but never fail the
/// request; only a report we cannot parse is rejected.
#[instrument(skip(state, params))]
pub async fn ingest_report(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorShape>)> {
    let report = match StationReport::from_push(&params) {
        Ok(report) => report,
        Err(e) => {
            error!("Rejected report: {}", e);
            let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
            return Err((status, Json(e.to_error_shape())));
        }
    };

    process_report(&state, &report).await;

    let body = serde_json::to_string_pretty(&echo(&params)).unwrap_or_default();
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

/// Sends `report` to Carbon, then runs every measurement through the alert engine.
#[instrument(skip(state, report), fields(station = %report.station))]
pub async fn process_report(state: &AppState, report: &StationReport) -> IngestOutcome {
    state.metrics.record_report(&report.station, report.skipped.len());
    if !report.skipped.is_empty() {
        debug!("Skipping non-numeric fields: {:?}", report.skipped);
    }

    let prefix = state.settings.read().await.metric_prefix.clone();
    let lines = lines_for(report, &prefix);
    info!("Sending metrics for {}", report.station);
    for line in &lines {
        debug!("Sending metric: {}", line.to_string().trim_end());
    }

    let mut outcome = IngestOutcome::default();
    match state.carbon.send(&lines).await {
        Ok(sent) => {
            state.metrics.record_sent(sent);
            outcome.lines_sent = sent;
        }
        Err(e) => {
            error!("Failed to send metrics for {}: {}", report.station, e);
            state.metrics.record_carbon_error();
            outcome.carbon_failed = true;
        }
    }

    let mut alerts = state.alerts.lock().await;
    for (metric, value) in &report.measurements {
        match alerts.evaluate(metric, *value).await {
            Ok(Some(_)) => {
                state.metrics.record_alert();
                outcome.alerts_sent += 1;
            }
            Ok(None) => {}
            Err(e) => {
                error!("Alert for {} not delivered: {}", metric, e);
                state.metrics.record_alert_failure();
                outcome.alert_failures += 1;
            }
        }
    }
    if let Err(e) = alerts.persist().await {
        error!("Failed to save alert state: {}", e);
    }

    outcome
}

/// The query string as a JSON object, first value per key.
fn echo(params: &[(String, String)]) -> Value {
    let mut map = Map::new();
    for (k, v) in params {
        if !map.contains_key(k) {
            map.insert(k.clone(), Value::String(v.clone()));
        }
    }
    Value::Object(map)
}

#[instrument(skip(_state))]
pub async fn health_check(State(_state): State<AppState>) -> Result<&'static str, StatusCode> {
    Ok("OK")
}

#[instrument(skip(state))]
pub async fn metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    match state.metrics.render() {
        Ok(metrics) => Ok(metrics),
        Err(e) => {
            error!("Failed to get metrics: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
