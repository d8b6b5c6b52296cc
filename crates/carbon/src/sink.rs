use async_trait::async_trait;
use aw_models::{AwError, Settings};
use std::sync::RwLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::line::{encode, CarbonLine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarbonEndpoint {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl CarbonEndpoint {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.carbon_server.clone(),
            port: settings.carbon_port,
            timeout: Duration::from_millis(settings.carbon_timeout_ms),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
pub trait CarbonSink: Send + Sync {
    /// Delivers `lines` and returns how many were written.
    async fn send(&self, lines: &[CarbonLine]) -> Result<usize, AwError>;

    /// Points the sink at a new endpoint after a config reload.
    fn reconfigure(&self, _endpoint: CarbonEndpoint) {}
}

/// Opens one TCP connection per batch, like a plain `nc` to Carbon would.
pub struct TcpCarbonSink {
    endpoint: RwLock<CarbonEndpoint>,
}

impl TcpCarbonSink {
    pub fn new(endpoint: CarbonEndpoint) -> Self {
        Self {
            endpoint: RwLock::new(endpoint),
        }
    }

    pub fn endpoint(&self) -> CarbonEndpoint {
        match self.endpoint.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl CarbonSink for TcpCarbonSink {
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    async fn send(&self, lines: &[CarbonLine]) -> Result<usize, AwError> {
        if lines.is_empty() {
            return Ok(0);
        }

        let endpoint = self.endpoint();
        let address = endpoint.address();
        let payload = encode(lines);

        let mut stream = timeout(endpoint.timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| AwError::CarbonError {
                reason: format!("timed out connecting to {}", address),
            })?
            .map_err(|e| AwError::CarbonError {
                reason: format!("connect to {} failed: {}", address, e),
            })?;

        timeout(endpoint.timeout, async {
            stream.write_all(payload.as_bytes()).await?;
            stream.flush().await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| AwError::CarbonError {
            reason: format!("timed out writing to {}", address),
        })?
        .map_err(|e| AwError::CarbonError {
            reason: format!("write to {} failed: {}", address, e),
        })?;

        debug!("Sent {} lines to {}", lines.len(), address);
        Ok(lines.len())
    }

    fn reconfigure(&self, endpoint: CarbonEndpoint) {
        let mut guard = match self.endpoint.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = endpoint;
    }
}
