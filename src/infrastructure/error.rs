use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{0}")]
    Api(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl InfraError {
    pub fn server_message(&self) -> Option<&str> {
        match self {
            InfraError::Api(message) => Some(message),
            _ => None,
        }
    }
}
