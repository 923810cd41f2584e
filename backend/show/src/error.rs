use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Stored record is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Failures at the builder boundary. Invariant violations inside the builder are
/// unreachable by construction and have no variant here.
#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("Roster has no candidates in one of the pools")]
    EmptyRoster,

    #[error("Nothing to save, the prediction has no pairs")]
    EmptyPrediction,

    #[error("Saving the prediction failed: {0}")]
    SaveFailed(String),

    #[error("Loading the previous prediction failed: {0}")]
    LoadFailed(String),

    #[error("Roster unavailable: {0}")]
    Roster(#[from] StoreError),
}
