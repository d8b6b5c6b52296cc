use aw_models::AwError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Key of the config load timestamp; never a metric.
pub const LAST_LOAD_KEY: &str = "last_load_ts";

/// What survives a restart: the last known alerting status of each metric
/// and when the config was last loaded. Stored as one flat JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertState {
    pub last_load_ts: Option<f64>,
    pub alerts: BTreeMap<String, bool>,
}

impl Serialize for AlertState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(ts) = self.last_load_ts {
            map.serialize_entry(LAST_LOAD_KEY, &ts)?;
        }
        for (metric, alerting) in &self.alerts {
            if metric != LAST_LOAD_KEY {
                map.serialize_entry(metric, alerting)?;
            }
        }
        map.end()
    }
}

/// Entries that are not booleans are dropped rather than failing the load.
impl<'de> Deserialize<'de> for AlertState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let mut state = AlertState::default();
        for (key, value) in raw {
            if key == LAST_LOAD_KEY {
                state.last_load_ts = value.as_f64();
            } else if let Value::Bool(alerting) = value {
                state.alerts.insert(key, alerting);
            }
        }
        Ok(state)
    }
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the state file, creating it empty when it does not exist yet.
    pub async fn load(&self) -> Result<AlertState, AwError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                info!("Loading state from {}", self.path.display());
                if contents.trim().is_empty() {
                    return Ok(AlertState::default());
                }
                serde_json::from_str(&contents).map_err(|e| AwError::StateStoreError {
                    reason: format!("{}: {}", self.path.display(), e),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let state = AlertState::default();
                self.save(&state).await?;
                Ok(state)
            }
            Err(e) => Err(AwError::StateStoreError {
                reason: format!("{}: {}", self.path.display(), e),
            }),
        }
    }

    /// Writes through a sibling temp file so readers never see half a document.
    pub async fn save(&self, state: &AlertState) -> Result<(), AwError> {
        let json = serde_json::to_string_pretty(state).map_err(|e| AwError::StateStoreError {
            reason: e.to_string(),
        })?;
        debug!("Writing state to {}:\n{}", self.path.display(), json);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
