use aw_models::{MetricValue, StationReport};
use std::fmt;

/// One datapoint in Graphite's plaintext protocol: `path value timestamp\n`.
#[derive(Debug, Clone, PartialEq)]
pub struct CarbonLine {
    pub path: String,
    pub value: MetricValue,
    pub timestamp: i64,
}

impl fmt::Display for CarbonLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} {}", self.path, self.value, self.timestamp)
    }
}

pub fn metric_path(prefix: &str, station: &str, name: &str) -> String {
    if prefix.is_empty() {
        format!("{}.{}", station, name)
    } else {
        format!("{}.{}.{}", prefix, station, name)
    }
}

/// Every measurement of `report` as a Carbon line, in report order.
pub fn lines_for(report: &StationReport, prefix: &str) -> Vec<CarbonLine> {
    report
        .measurements
        .iter()
        .map(|(name, value)| CarbonLine {
            path: metric_path(prefix, &report.station, name),
            value: *value,
            timestamp: report.timestamp,
        })
        .collect()
}

pub fn encode(lines: &[CarbonLine]) -> String {
    lines.iter().map(ToString::to_string).collect()
}
