/// Centralized error types for the metric sync pipeline
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    // Authentication Errors
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Token expired: {0}")]
    TokenExpired(String),

    // Network Errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Upstream rejected request: {status} - {body}")]
    UpstreamRejected { status: u16, body: String },

    // Data Errors
    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid watermark: {0}")]
    InvalidWatermark(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // File I/O Errors
    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("File write failed: {0}")]
    FileWriteFailed(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Per-item failures that the run absorbs by skipping one instance/metric pair
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::UpstreamRejected { .. } | SyncError::MissingData(_)
        )
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            SyncError::AuthenticationFailed(_) => "AUTH_001",
            SyncError::TokenExpired(_) => "AUTH_002",
            SyncError::HttpError(_) => "NET_001",
            SyncError::UpstreamRejected { .. } => "NET_002",
            SyncError::MissingData(_) => "DATA_001",
            SyncError::DeserializationError(_) => "DATA_002",
            SyncError::InvalidWatermark(_) => "DATA_003",
            SyncError::ConfigError(_) => "CFG_001",
            SyncError::FileError(_) => "FILE_001",
            SyncError::FileWriteFailed(_) => "FILE_002",
        }
    }
}
