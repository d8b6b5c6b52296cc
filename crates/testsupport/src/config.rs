use anyhow::Result;
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;

/// A config file in its own temp directory, with the state file next to it.
pub struct TestConfig {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestConfig {
    /// Writes `overrides` on top of a config pointing Carbon at `carbon_port`.
    pub fn write(carbon_port: u16, overrides: Value) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        let mut config = json!({
            "CARBON_SERVER": "127.0.0.1",
            "CARBON_PORT": carbon_port,
            "CARBON_TIMEOUT_MS": 1000,
            "STATE_FILE": dir.path().join("state.json"),
            "BIND": "127.0.0.1",
            "PORT": 0,
        });
        merge(&mut config, overrides);
        std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;
        Ok(Self { dir, path })
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.path().join("state.json")
    }

    pub fn rewrite(&self, config: &Value) -> Result<()> {
        std::fs::write(&self.path, serde_json::to_string_pretty(config)?)?;
        Ok(())
    }

    pub fn read(&self) -> Result<Value> {
        Ok(serde_json::from_str(&std::fs::read_to_string(&self.path)?)?)
    }
}

fn merge(base: &mut Value, overrides: Value) {
    if let (Value::Object(base), Value::Object(overrides)) = (base, overrides) {
        for (k, v) in overrides {
            base.insert(k, v);
        }
    }
}
