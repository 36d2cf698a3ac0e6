//! Error types for the vector database client and reference service

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for client and service operations
pub type Result<T> = std::result::Result<T, VdbError>;

/// Errors surfaced at the service boundary.
///
/// The enum is serializable so the reference server can ship it to the HTTP
/// client, which reconstructs the same variant on its side.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VdbError {
    #[error("Connection error: {reason}")]
    Connection { reason: String },

    #[error("Schema error: {reason}")]
    Schema { reason: String },

    #[error("{resource} already exists: {name}")]
    AlreadyExists { resource: String, name: String },

    #[error("Insert error: {reason}")]
    Insert { reason: String },

    #[error("Index error: {reason}")]
    Index { reason: String },

    #[error("Load error: {reason}")]
    Load { reason: String },

    #[error("Search error: {reason}")]
    Search { reason: String },

    #[error("{resource} not found: {name}")]
    NotFound { resource: String, name: String },

    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    #[error("Protocol error: {reason}")]
    Protocol { reason: String },
}

impl VdbError {
    pub fn connection(reason: impl Into<String>) -> Self {
        VdbError::Connection {
            reason: reason.into(),
        }
    }

    pub fn schema(reason: impl Into<String>) -> Self {
        VdbError::Schema {
            reason: reason.into(),
        }
    }

    pub fn insert(reason: impl Into<String>) -> Self {
        VdbError::Insert {
            reason: reason.into(),
        }
    }

    pub fn index(reason: impl Into<String>) -> Self {
        VdbError::Index {
            reason: reason.into(),
        }
    }

    pub fn load(reason: impl Into<String>) -> Self {
        VdbError::Load {
            reason: reason.into(),
        }
    }

    pub fn search(reason: impl Into<String>) -> Self {
        VdbError::Search {
            reason: reason.into(),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        VdbError::Protocol {
            reason: reason.into(),
        }
    }

    pub fn database_not_found(name: impl Into<String>) -> Self {
        VdbError::NotFound {
            resource: "database".to_string(),
            name: name.into(),
        }
    }

    pub fn collection_not_found(name: impl Into<String>) -> Self {
        VdbError::NotFound {
            resource: "collection".to_string(),
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VdbError::NotFound { .. })
    }
}
