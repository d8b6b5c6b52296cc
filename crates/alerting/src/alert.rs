use aw_models::MetricValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlertKind {
    Problem,
    Recovery,
}

impl AlertKind {
    pub fn subject_prefix(&self) -> &'static str {
        match self {
            AlertKind::Problem => "[PROBLEM]",
            AlertKind::Recovery => "[RECOVERY]",
        }
    }
}

/// A change in alerting status for one metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub metric: String,
    pub value: MetricValue,
    pub threshold: Option<f64>,
}

impl Alert {
    pub fn subject(&self) -> String {
        format!("{} {}", self.kind.subject_prefix(), self.metric)
    }

    pub fn body(&self) -> String {
        let threshold = match self.threshold {
            Some(t) => t.to_string(),
            None => "None".to_string(),
        };
        format!(
            "Weather metric {} is at value {}, configured threshold is {}",
            self.metric, self.value, threshold
        )
    }
}
