use thiserror::Error;

pub type Result<T> = std::result::Result<T, DgraphError>;

#[derive(Debug, Error)]
pub enum DgraphError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Query error ({code}): {message}")]
    Query { code: String, message: String },

    #[error("Transaction aborted: {0}")]
    Aborted(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl DgraphError {
    /// True when the store rejected a commit because of a conflicting write.
    pub fn is_aborted(&self) -> bool {
        matches!(self, DgraphError::Aborted(_))
    }
}

impl From<reqwest::Error> for DgraphError {
    fn from(err: reqwest::Error) -> Self {
        DgraphError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for DgraphError {
    fn from(err: serde_json::Error) -> Self {
        DgraphError::Parse(err.to_string())
    }
}
