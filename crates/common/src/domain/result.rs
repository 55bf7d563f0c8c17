use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A conditional write lost the race against another writer.
    #[error("Document update conflict: {0}")]
    DocumentConflict(String),

    #[error("Gave up on document {document_id} after {attempts} conflicting writes")]
    RetriesExhausted { document_id: String, attempts: u32 },

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

impl DomainError {
    /// True for errors that are rejected before the store is touched.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DomainError::MalformedMessage(_) | DomainError::ValidationError(_)
        )
    }
}
