use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::AwError;

/// Query keys of a custom-server push that identify the report rather than measure anything.
pub const PASSKEY_KEY: &str = "PASSKEY";
pub const DATEUTC_KEY: &str = "dateutc";
pub const STATIONTYPE_KEY: &str = "stationtype";

const PUSH_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Int(v) => *v as f64,
            MetricValue::Float(v) => *v,
        }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        let Value::Number(number) = value else {
            return None;
        };
        if let Some(i) = number.as_i64() {
            return Some(MetricValue::Int(i));
        }
        number
            .as_f64()
            .filter(|f| f.is_finite())
            .map(MetricValue::Float)
    }
}

impl FromStr for MetricValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(i) = s.parse::<i64>() {
            return Ok(MetricValue::Int(i));
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(MetricValue::Float(f)),
            _ => Err(format!("not a number: {:?}", s)),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One reading from one station, ready to be turned into Carbon lines and checked against thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationReport {
    pub station: String,
    /// Unix seconds, UTC.
    pub timestamp: i64,
    pub measurements: Vec<(String, MetricValue)>,
    /// Fields present in the report that were not numeric.
    #[serde(default)]
    pub skipped: Vec<String>,
}

impl StationReport {
    /// Builds a report from the query pairs a station sends to a custom server.
    ///
    /// `PASSKEY` names the station and `dateutc` carries the UTC time as
    /// `YYYY-MM-DD HH:MM:SS` (or the literal `now`). Every other key except
    /// `stationtype` is a measurement when it parses as a number. The first
    /// occurrence of a repeated key wins.
    pub fn from_push(pairs: &[(String, String)]) -> Result<Self, AwError> {
        let first = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let station = first(PASSKEY_KEY)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AwError::invalid_report("missing PASSKEY"))?;
        if !is_path_safe(station) {
            return Err(AwError::invalid_report(format!("PASSKEY {:?} is not usable in a metric path", station)));
        }
        let station = station.to_string();
        let dateutc = first(DATEUTC_KEY).ok_or_else(|| AwError::invalid_report("missing dateutc"))?;
        let timestamp = parse_push_date(dateutc)?;

        let mut measurements: Vec<(String, MetricValue)> = Vec::new();
        let mut skipped = Vec::new();
        for (key, raw) in pairs {
            if matches!(key.as_str(), PASSKEY_KEY | DATEUTC_KEY | STATIONTYPE_KEY) {
                continue;
            }
            if measurements.iter().any(|(k, _)| k == key) || skipped.contains(key) {
                continue;
            }
            if !is_path_safe(key) {
                skipped.push(key.clone());
                continue;
            }
            match raw.parse::<MetricValue>() {
                Ok(value) => measurements.push((key.clone(), value)),
                Err(_) => skipped.push(key.clone()),
            }
        }

        Ok(Self {
            station,
            timestamp,
            measurements,
            skipped,
        })
    }

    /// Builds a report from one record returned by the REST API, where
    /// `dateutc` is epoch milliseconds and measurements are JSON numbers.
    pub fn from_api_record(mac: &str, record: &Value) -> Result<Self, AwError> {
        if !is_path_safe(mac) {
            return Err(AwError::invalid_report(format!("device {:?} is not usable in a metric path", mac)));
        }
        let obj = record
            .as_object()
            .ok_or_else(|| AwError::invalid_report("record is not a JSON object"))?;

        let millis = obj
            .get(DATEUTC_KEY)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .ok_or_else(|| AwError::invalid_report("record has no numeric dateutc"))?;

        let mut measurements = Vec::new();
        let mut skipped = Vec::new();
        for (key, value) in obj {
            if key == DATEUTC_KEY {
                continue;
            }
            if !is_path_safe(key) {
                skipped.push(key.clone());
                continue;
            }
            match MetricValue::from_json(value) {
                Some(v) => measurements.push((key.clone(), v)),
                None => skipped.push(key.clone()),
            }
        }

        Ok(Self {
            station: mac.to_string(),
            timestamp: millis / 1000,
            measurements,
            skipped,
        })
    }
}

/// Whether `name` can sit inside a Carbon path. Whitespace and control
/// characters would split the plaintext line.
pub fn is_path_safe(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn parse_push_date(raw: &str) -> Result<i64, AwError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("now") {
        return Ok(Utc::now().timestamp());
    }
    NaiveDateTime::parse_from_str(raw, PUSH_DATE_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|e| AwError::invalid_report(format!("bad dateutc {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_metric_value_prefers_integers() {
        assert_eq!("42".parse::<MetricValue>().unwrap(), MetricValue::Int(42));
        assert_eq!("29.92".parse::<MetricValue>().unwrap(), MetricValue::Float(29.92));
        assert_eq!("-3".parse::<MetricValue>().unwrap(), MetricValue::Int(-3));
        assert!("abc".parse::<MetricValue>().is_err());
        assert!("nan".parse::<MetricValue>().is_err());
        assert!("inf".parse::<MetricValue>().is_err());
    }

    #[test]
    fn test_metric_value_display() {
        assert_eq!(MetricValue::Int(7).to_string(), "7");
        assert_eq!(MetricValue::Float(0.25).to_string(), "0.25");
    }

    #[test]
    fn test_from_push_extracts_measurements() {
        let report = StationReport::from_push(&pairs(&[
            ("PASSKEY", "AA:BB:CC:DD:EE:FF"),
            ("stationtype", "AMBWeatherV4.2.9"),
            ("dateutc", "2023-07-01 12:00:00"),
            ("tempf", "71.6"),
            ("humidity", "45"),
            ("battout", "1"),
        ]))
        .unwrap();

        assert_eq!(report.station, "AA:BB:CC:DD:EE:FF");
        assert_eq!(report.timestamp, 1_688_212_800);
        assert_eq!(
            report.measurements,
            vec![
                ("tempf".to_string(), MetricValue::Float(71.6)),
                ("humidity".to_string(), MetricValue::Int(45)),
                ("battout".to_string(), MetricValue::Int(1)),
            ]
        );
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_from_push_skips_non_numeric_and_duplicates() {
        let report = StationReport::from_push(&pairs(&[
            ("PASSKEY", "abc"),
            ("dateutc", "2023-07-01 12:00:00"),
            ("tempf", "70"),
            ("tempf", "99"),
            ("lastRain", "2023-06-30T10:00:00"),
        ]))
        .unwrap();

        assert_eq!(report.measurements, vec![("tempf".to_string(), MetricValue::Int(70))]);
        assert_eq!(report.skipped, vec!["lastRain".to_string()]);
    }

    #[test]
    fn test_from_push_requires_identity() {
        let missing_key = StationReport::from_push(&pairs(&[("dateutc", "2023-07-01 12:00:00")]));
        assert!(matches!(missing_key, Err(AwError::InvalidReport { .. })));

        let missing_date = StationReport::from_push(&pairs(&[("PASSKEY", "abc")]));
        assert!(matches!(missing_date, Err(AwError::InvalidReport { .. })));

        let bad_date = StationReport::from_push(&pairs(&[("PASSKEY", "abc"), ("dateutc", "yesterday")]));
        assert!(matches!(bad_date, Err(AwError::InvalidReport { .. })));
    }

    #[test]
    fn test_from_push_skips_keys_that_would_break_carbon_lines() {
        let report = StationReport::from_push(&pairs(&[
            ("PASSKEY", "AA"),
            ("dateutc", "2023-07-01 12:00:00"),
            ("x 1 0\nevil.injected", "7"),
            ("tab\tkey", "1"),
            ("", "3"),
            ("tempf", "70"),
        ]))
        .unwrap();

        assert_eq!(report.measurements, vec![("tempf".to_string(), MetricValue::Int(70))]);
        assert_eq!(report.skipped.len(), 3);
    }

    #[test]
    fn test_from_push_rejects_unsafe_passkey() {
        for passkey in ["AA BB", "AA\nweather.x 1 0", "AA\u{7f}"] {
            let err = StationReport::from_push(&pairs(&[
                ("PASSKEY", passkey),
                ("dateutc", "2023-07-01 12:00:00"),
                ("tempf", "70"),
            ]))
            .unwrap_err();
            assert!(matches!(err, AwError::InvalidReport { .. }), "{:?}", passkey);
        }
    }

    #[test]
    fn test_from_api_record_guards_paths() {
        let record = json!({"dateutc": 1_640_476_800_000i64, "bad key": 1, "tempf": 2});
        let report = StationReport::from_api_record("AA:BB", &record).unwrap();
        assert_eq!(report.measurements, vec![("tempf".to_string(), MetricValue::Int(2))]);
        assert_eq!(report.skipped, vec!["bad key".to_string()]);

        assert!(StationReport::from_api_record("AA BB", &record).is_err());
    }

    #[test]
    fn test_from_push_accepts_now() {
        let before = Utc::now().timestamp();
        let report = StationReport::from_push(&pairs(&[("PASSKEY", "abc"), ("dateutc", "now")])).unwrap();
        assert!(report.timestamp >= before);
    }

    #[test]
    fn test_from_api_record() {
        let record = json!({
            "dateutc": 1_640_476_800_000i64,
            "tempf": 33.4,
            "humidity": 81,
            "date": "2021-12-26T00:00:00.000Z",
            "lastRain": "2021-12-25T10:00:00.000Z"
        });

        let report = StationReport::from_api_record("AA:BB", &record).unwrap();
        assert_eq!(report.station, "AA:BB");
        assert_eq!(report.timestamp, 1_640_476_800);
        assert!(report.measurements.contains(&("tempf".to_string(), MetricValue::Float(33.4))));
        assert!(report.measurements.contains(&("humidity".to_string(), MetricValue::Int(81))));
        assert_eq!(report.measurements.len(), 2);
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn test_from_api_record_requires_dateutc() {
        let err = StationReport::from_api_record("AA:BB", &json!({"tempf": 1})).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }
}
