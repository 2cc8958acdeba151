use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] bookfeed_core::ValidationError),

    #[error(transparent)]
    Fetch(#[from] bookfeed_core::FetchError),

    #[error("cache store error: {0}")]
    Store(#[from] bookfeed_store::StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            // Circuit-open is the degrade-gracefully case; give it its own
            // code so wrappers can serve the last known snapshot instead.
            Self::Fetch(bookfeed_core::FetchError::CircuitOpen { .. }) => 7,
            Self::Fetch(_) => 3,
            Self::Serialization(_) => 4,
            Self::Store(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
