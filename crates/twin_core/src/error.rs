use thiserror::Error;

/// Errors raised inside twin engines.
///
/// Periodic updates never surface these: the twin logs them and keeps its
/// previous state. Unknown twin ids are not errors at all.
#[derive(Debug, Error)]
pub enum TwinError {
    #[error("invalid update for `{field}`: {reason}")]
    InvalidUpdate { field: String, reason: String },

    #[error("non-finite value produced for `{field}`")]
    NonFinite { field: &'static str },

    #[error("classifier failure: {0}")]
    Classifier(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl TwinError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUpdate {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
