use figment::providers::{Env, Format, Json, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{AwError, Threshold};

pub const DEFAULT_AW_API_URL: &str = "https://rt.ambientweather.net/v1";
pub const ENV_PREFIX: &str = "AW2GRAPHITE_";

/// Runtime settings, read from `config.json` using the upper-case key names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Settings {
    pub carbon_server: String,
    pub carbon_port: u16,
    pub carbon_timeout_ms: u64,
    pub metric_prefix: String,
    pub loglevel: Option<String>,
    #[serde(alias = "ALERT_STATE_FILE")]
    pub state_file: PathBuf,
    pub smtp_server: Option<String>,
    pub smtp_port: u16,
    pub alert_from: Option<String>,
    pub alert_to: Option<Recipients>,
    pub alert_thresholds: BTreeMap<String, Threshold>,
    pub aw_api_key: Option<String>,
    pub aw_application_key: Option<String>,
    pub aw_api_url: String,
    pub bind: String,
    pub port: u16,
    pub reload_interval_secs: u64,
}

/// `ALERT_TO` may be a single address or a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Recipients::One(addr) => vec![addr.clone()],
            Recipients::Many(addrs) => addrs.clone(),
        }
    }
}

/// One key whose value differs between two settings snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    pub key: String,
    pub old: Value,
    pub new: Value,
}

impl ConfigChange {
    /// Maps and lists do not fit on one log line.
    pub fn is_structured(&self) -> bool {
        matches!(self.new, Value::Object(_) | Value::Array(_))
            || matches!(self.old, Value::Object(_) | Value::Array(_))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            carbon_server: "127.0.0.1".to_string(),
            carbon_port: 2003,
            carbon_timeout_ms: 5000,
            metric_prefix: "weather".to_string(),
            loglevel: None,
            state_file: PathBuf::from("state.json"),
            smtp_server: None,
            smtp_port: 25,
            alert_from: None,
            alert_to: None,
            alert_thresholds: BTreeMap::new(),
            aw_api_key: None,
            aw_application_key: None,
            aw_api_url: DEFAULT_AW_API_URL.to_string(),
            bind: "0.0.0.0".to_string(),
            port: 5000,
            reload_interval_secs: 30,
        }
    }
}

impl Settings {
    /// Reads `path` (JSON, or TOML for a `.toml` file) and applies
    /// `AW2GRAPHITE_*` environment overrides on top.
    pub fn load(path: &Path) -> Result<Self, AwError> {
        if !path.is_file() {
            return Err(AwError::ConfigError {
                reason: format!("config file {} not found", path.display()),
            });
        }

        let file = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Figment::new().merge(Toml::file(path)),
            _ => Figment::new().merge(Json::file(path)),
        };

        file.merge(Env::prefixed(ENV_PREFIX).lowercase(false))
            .extract()
            .map_err(|e| AwError::ConfigError {
                reason: format!("{}: {}", path.display(), e),
            })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn alert_recipients(&self) -> Vec<String> {
        self.alert_to.as_ref().map(Recipients::to_vec).unwrap_or_default()
    }

    pub fn smtp_enabled(&self) -> bool {
        self.smtp_server.is_some() && self.alert_from.is_some() && !self.alert_recipients().is_empty()
    }

    pub fn threshold_for(&self, metric: &str) -> Option<&Threshold> {
        self.alert_thresholds.get(metric)
    }

    /// Keys whose values differ from `previous`, in key order.
    pub fn diff(&self, previous: &Settings) -> Vec<ConfigChange> {
        let new = to_map(self);
        let mut old = to_map(previous);

        let mut changes = Vec::new();
        for (key, new_value) in new {
            let old_value = old.remove(&key).unwrap_or(Value::Null);
            if old_value != new_value {
                changes.push(ConfigChange {
                    key,
                    old: old_value,
                    new: new_value,
                });
            }
        }
        changes
    }
}

fn to_map(settings: &Settings) -> BTreeMap<String, Value> {
    match serde_json::to_value(settings) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    }
}
