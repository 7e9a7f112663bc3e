use thiserror::Error;

/// Raised when a record cannot be shaped into its public representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("{resource} {id} is missing its associated {relation}")]
    MissingRelation {
        resource: &'static str,
        id: i64,
        relation: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}
