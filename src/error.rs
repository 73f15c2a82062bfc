use thiserror::Error;

/// Failures talking to the Argo CD API server.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// A payload that could not be decoded. Dropped without ending the stream.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Error reported by the server inside an open stream.
    #[error("stream error: {0}")]
    Stream(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("client setup failed: {0}")]
    Setup(String),
}

impl ApiError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, ApiError::Malformed(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Malformed(e.to_string())
    }
}

/// Invalid command line or environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid server address {value:?}: {reason}")]
    InvalidServer { value: String, reason: String },

    #[error("cannot open log file {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
