use aw_models::{AwError, Settings};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

/// A station as listed by `GET /devices`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub mac_address: String,
    #[serde(default)]
    pub info: Option<Value>,
}

pub struct AmbientClient {
    client: Client,
    base_url: String,
    application_key: String,
    api_key: String,
}

impl AmbientClient {
    pub fn new(base_url: impl Into<String>, application_key: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            application_key: application_key.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, AwError> {
        match (&settings.aw_api_key, &settings.aw_application_key) {
            (Some(api_key), Some(app_key)) => Ok(Self::new(settings.aw_api_url.clone(), app_key.clone(), api_key.clone())),
            _ => Err(AwError::ConfigError {
                reason: "API key and application key must be specified".to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    pub async fn devices(&self) -> Result<Vec<Device>, AwError> {
        self.get("devices", &[]).await
    }

    /// Historic records for one station, newest first, as the API returns them.
    #[instrument(skip(self))]
    pub async fn device_data(&self, mac: &str, limit: u32, end_date: Option<&str>) -> Result<Vec<Value>, AwError> {
        let limit = limit.to_string();
        let mut params = vec![("limit", limit.as_str())];
        if let Some(end_date) = end_date {
            params.push(("endDate", end_date));
        }
        self.get(&format!("devices/{}", mac), &params).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T, AwError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .query(&[
                ("applicationKey", self.application_key.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .query(params)
            .send()
            .await
            .map_err(|e| AwError::HttpError { reason: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AwError::AmbientApiError {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AwError::HttpError { reason: e.to_string() })
    }
}
