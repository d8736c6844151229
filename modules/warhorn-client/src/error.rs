use thiserror::Error;

pub type Result<T> = std::result::Result<T, WarhornError>;

#[derive(Debug, Error)]
pub enum WarhornError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("API error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WarhornError {
    /// HTTP status of a terminal response, if the failure was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            WarhornError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for WarhornError {
    fn from(err: reqwest::Error) -> Self {
        WarhornError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for WarhornError {
    fn from(err: serde_json::Error) -> Self {
        WarhornError::Parse(err.to_string())
    }
}
