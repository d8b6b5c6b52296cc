use aw_carbon::{lines_for, CarbonSink};
use aw_models::{AwError, StationReport};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::client::AmbientClient;

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    /// Only this station; otherwise every device on the account.
    pub mac: Option<String>,
    pub limit: u32,
    pub end_date: Option<String>,
    /// Pause after listing devices; the API allows one request per second.
    pub device_pause: Duration,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            mac: None,
            limit: 288,
            end_date: None,
            device_pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BackfillSummary {
    pub devices: usize,
    pub records: usize,
    pub lines: usize,
    pub failures: usize,
}

/// Pulls historic records from the REST API and writes them to Carbon.
///
/// A device or record that fails is logged and counted; the run carries on
/// with the rest. Only failing to list devices aborts.
#[instrument(skip(client, sink, opts), fields(mac = ?opts.mac, limit = opts.limit))]
pub async fn backfill(
    client: &AmbientClient,
    sink: &dyn CarbonSink,
    prefix: &str,
    opts: &BackfillOptions,
) -> Result<BackfillSummary, AwError> {
    let macs = match &opts.mac {
        Some(mac) => vec![mac.clone()],
        None => {
            let devices = client.devices().await?;
            info!("Found {} devices", devices.len());
            tokio::time::sleep(opts.device_pause).await;
            devices.into_iter().map(|d| d.mac_address).collect()
        }
    };

    let mut summary = BackfillSummary::default();
    for mac in macs {
        summary.devices += 1;
        let records = match client
            .device_data(&mac, opts.limit, opts.end_date.as_deref())
            .await
        {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to fetch data for {}: {}", mac, e);
                summary.failures += 1;
                continue;
            }
        };

        for record in &records {
            summary.records += 1;
            let report = match StationReport::from_api_record(&mac, record) {
                Ok(report) => report,
                Err(e) => {
                    error!("Skipping record for {}: {}", mac, e);
                    summary.failures += 1;
                    continue;
                }
            };

            info!("Sending metrics for {} at timestamp {}", mac, report.timestamp);
            match sink.send(&lines_for(&report, prefix)).await {
                Ok(sent) => summary.lines += sent,
                Err(e) => {
                    error!("Failed to send metrics for {}: {}", mac, e);
                    summary.failures += 1;
                }
            }
        }
    }

    Ok(summary)
}
