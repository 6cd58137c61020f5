use thiserror::Error;

/// Errors from document store operations (used by the `DocumentStore` port in
/// waypoint-core).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on '{key}': {message}")]
    Io { key: String, message: String },

    #[error("serialization error on '{key}': {message}")]
    Serialization { key: String, message: String },

    #[error("invalid document key '{0}'")]
    InvalidKey(String),
}

impl StoreError {
    pub fn io(key: &str, err: impl std::fmt::Display) -> Self {
        StoreError::Io {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub fn serialization(key: &str, err: impl std::fmt::Display) -> Self {
        StoreError::Serialization {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}
