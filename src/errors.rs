use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Collection not registered: {0}")]
    UnknownCollection(String),

    #[error("Storage fault: {0}")]
    StorageFault(String),

    #[error("Malformed cache entry '{key}': {reason}")]
    MalformedCacheEntry { key: String, reason: String },

    #[error("Duplicate document id: {0}")]
    DuplicateId(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("bridge closed")]
    BridgeClosed,

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        DbError::StorageFault(e.to_string())
    }
}

impl DbError {
    /// Stable machine-readable name of the error kind, used on the JSON bridge.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DbError::UnknownCollection(_) => "UnknownCollection",
            DbError::StorageFault(_) => "StorageFault",
            DbError::MalformedCacheEntry { .. } => "MalformedCacheEntry",
            DbError::DuplicateId(_) => "DuplicateId",
            DbError::InvalidDocument(_) => "InvalidDocument",
            DbError::InvalidQuery(_) => "InvalidQuery",
            DbError::InvalidPatch(_) => "InvalidPatch",
            DbError::Config(_) => "Config",
            DbError::BridgeClosed => "BridgeClosed",
            DbError::Json(_) => "Json",
        }
    }
}
