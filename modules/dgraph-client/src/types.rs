use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DgraphError;

/// Marker Dgraph puts in the error message when a commit loses a write conflict.
const ABORTED_MARKER: &str = "Transaction has been aborted";

/// Body for `POST /query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: &'a BTreeMap<String, String>,
}

/// Body for `POST /mutate` with a JSON set payload.
#[derive(Debug, Clone, Serialize)]
pub struct MutationRequest<'a> {
    pub set: &'a serde_json::Value,
}

/// Every Dgraph HTTP response is wrapped in `{"data": ..., "errors": [...]}`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorExtensions {
    pub code: Option<String>,
}

impl ApiError {
    /// Classify a store-reported error. Aborts get their own variant so callers can retry.
    pub fn into_error(self) -> DgraphError {
        if self.message.contains(ABORTED_MARKER) {
            return DgraphError::Aborted(self.message);
        }
        let code = self
            .extensions
            .and_then(|ext| ext.code)
            .unwrap_or_else(|| "Unknown".to_string());
        DgraphError::Query {
            code,
            message: self.message,
        }
    }
}

/// The `data` object of a committed mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assigned {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    /// Blank-node label (without the `_:` prefix) to newly minted uid.
    #[serde(default)]
    pub uids: BTreeMap<String, String>,
}

impl Assigned {
    pub fn uid_for(&self, label: &str) -> Option<&str> {
        self.uids.get(label).map(String::as_str)
    }
}
