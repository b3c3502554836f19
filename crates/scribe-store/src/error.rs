#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt record for {key}: {detail}")]
    CorruptRecord { key: String, detail: String },

    #[error("IO error: {0}")]
    Io(String),
}

impl StoreError {
    pub(crate) fn corrupt(key: &str, detail: impl std::fmt::Display) -> Self {
        StoreError::CorruptRecord {
            key: key.to_string(),
            detail: detail.to_string(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
