//! Drover error types.
//!
//! Every fallible operation in the controller/satellite stack reports one of
//! these variants. The variants map onto the error taxonomy of the update
//! pipeline: stale input is never an error (it is logged and dropped), while
//! identity divergence, implementation errors and failed commits are fatal to
//! the controller connection (see [`DrError::is_fatal`]).

use serde::{Deserialize, Serialize};

/// Unified error type for all drover operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DrError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(
        "divergent identifiers for {kind} (local '{local}' has {local_id}, received '{remote}' has {remote_id})"
    )]
    DivergentIds {
        kind: String,
        local: String,
        remote: String,
        local_id: String,
        remote_id: String,
    },
    #[error("unknown storage pool '{pool}' for local volume on node '{node}'")]
    UnknownStoragePool { pool: String, node: String },
    #[error("implementation error: {0}")]
    Implementation(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
    #[error("{0} lock not held in write mode")]
    NotLocked(String),
    #[error("network error")]
    Network,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl DrError {
    /// Identity divergence between a local object and its received
    /// description.
    pub fn divergent(
        kind: impl Into<String>,
        name: impl Into<String>,
        local_id: impl ToString,
        remote_id: impl ToString,
    ) -> Self {
        let name = name.into();
        Self::DivergentIds {
            kind: kind.into(),
            local: name.clone(),
            remote: name,
            local_id: local_id.to_string(),
            remote_id: remote_id.to_string(),
        }
    }

    /// Build an implementation error from anything printable.
    pub fn implementation(msg: impl Into<String>) -> Self {
        Self::Implementation(msg.into())
    }

    /// Whether this error must tear down the controller connection.
    ///
    /// Every error reaching the apply loop is fatal except a deletion whose
    /// target is already gone.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

/// Result type alias for drover operations.
pub type DrResult<T> = Result<T, DrError>;

impl From<std::io::Error> for DrError {
    fn from(e: std::io::Error) -> Self {
        DrError::Io(e.to_string())
    }
}

impl From<bincode::Error> for DrError {
    fn from(e: bincode::Error) -> Self {
        DrError::Protocol(e.to_string())
    }
}

impl From<toml::de::Error> for DrError {
    fn from(e: toml::de::Error) -> Self {
        DrError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for DrError {
    fn from(e: toml::ser::Error) -> Self {
        DrError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_not_fatal() {
        assert!(!DrError::NotFound("node 'a'".into()).is_fatal());
        assert!(DrError::implementation("boom").is_fatal());
        assert!(DrError::Database("commit failed".into()).is_fatal());
    }

    #[test]
    fn test_divergent_ids_message() {
        let a = uuid::Uuid::from_u128(1);
        let b = uuid::Uuid::from_u128(2);
        let err = DrError::divergent("Node", "alpha", a, b);
        let msg = err.to_string();
        assert!(msg.contains("Node"));
        assert!(msg.contains(&a.to_string()));
        assert!(msg.contains(&b.to_string()));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        match DrError::from(io) {
            DrError::Io(msg) => assert!(msg.contains("disk gone")),
            other => panic!("expected Io, got {:?}", other),
        }
    }
}
