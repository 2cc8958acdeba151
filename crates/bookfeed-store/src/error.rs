use thiserror::Error;

use bookfeed_core::CacheStoreError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

impl From<StoreError> for CacheStoreError {
    fn from(error: StoreError) -> Self {
        CacheStoreError::new(error.to_string())
    }
}
