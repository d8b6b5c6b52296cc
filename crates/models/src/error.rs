use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorShape {
    pub error_message: String,
    pub error_type: String,
}

#[derive(Error, Debug)]
pub enum AwError {
    #[error("Invalid report: {reason}")]
    InvalidReport { reason: String },

    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    #[error("Carbon error: {reason}")]
    CarbonError { reason: String },

    #[error("Notification failed: {reason}")]
    NotificationError { reason: String },

    #[error("State store error: {reason}")]
    StateStoreError { reason: String },

    #[error("Ambient Weather API returned {status}: {body}")]
    AmbientApiError { status: u16, body: String },

    #[error("HTTP error: {reason}")]
    HttpError { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {reason}")]
    InternalError { reason: String },
}

impl AwError {
    pub fn to_error_shape(&self) -> ErrorShape {
        ErrorShape {
            error_message: self.to_string(),
            error_type: self.error_type().to_string(),
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            AwError::InvalidReport { .. } => "InvalidReportException",
            AwError::ConfigError { .. } => "ConfigurationException",
            AwError::CarbonError { .. } => "CarbonException",
            AwError::NotificationError { .. } => "NotificationException",
            AwError::StateStoreError { .. } => "StateStoreException",
            AwError::AmbientApiError { .. } => "AmbientApiException",
            AwError::HttpError { .. } => "HttpException",
            AwError::Io(_) => "ServiceException",
            AwError::InternalError { .. } => "ServiceException",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            AwError::InvalidReport { .. } => 400,
            AwError::ConfigError { .. } => 500,
            AwError::CarbonError { .. } => 502,
            AwError::NotificationError { .. } => 502,
            AwError::StateStoreError { .. } => 500,
            AwError::AmbientApiError { .. } => 502,
            AwError::HttpError { .. } => 502,
            AwError::Io(_) => 500,
            AwError::InternalError { .. } => 500,
        }
    }

    pub fn invalid_report(reason: impl Into<String>) -> Self {
        AwError::InvalidReport { reason: reason.into() }
    }
}
