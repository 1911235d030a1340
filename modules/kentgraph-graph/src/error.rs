use dgraph_client::DgraphError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("No {kind} found with uid {uid}")]
    NotFound { kind: &'static str, uid: String },

    #[error("{kind} has neither a uid nor an external id")]
    Unidentified { kind: &'static str },

    #[error("Invalid uid: {0:?}")]
    InvalidUid(String),

    #[error("Invalid predicate name: {0:?}")]
    InvalidPredicate(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Store(#[from] DgraphError),
}

impl GraphError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound { .. })
    }

    /// Errors caused by the caller's input, detected before any round trip.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            GraphError::Unidentified { .. }
                | GraphError::InvalidUid(_)
                | GraphError::InvalidPredicate(_)
        )
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, GraphError::Store(e) if e.is_aborted())
    }
}
