use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison applied as `value <op> threshold`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    /// Anything we do not recognise. Never alerts.
    #[serde(other)]
    Unknown,
}

impl Operator {
    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Ge => value >= threshold,
            Operator::Lt => value < threshold,
            Operator::Le => value <= threshold,
            Operator::Eq => value == threshold,
            Operator::Ne => value != threshold,
            Operator::Unknown => false,
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" => Ok(Operator::Gt),
            "ge" => Ok(Operator::Ge),
            "lt" => Ok(Operator::Lt),
            "le" => Ok(Operator::Le),
            "eq" => Ok(Operator::Eq),
            "ne" => Ok(Operator::Ne),
            _ => Err(format!("Invalid operator: {}", s)),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Threshold {
    #[serde(default)]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Threshold {
    pub fn new(operator: Operator, threshold: f64) -> Self {
        Self {
            operator: Some(operator),
            threshold: Some(threshold),
        }
    }

    pub fn is_breached(&self, value: f64) -> bool {
        match (self.operator, self.threshold) {
            (Some(op), Some(threshold)) => op.compare(value, threshold),
            _ => false,
        }
    }
}
