use thiserror::Error;

/// Structural problems with a submission that stop a whole tab from grading.
///
/// Data-quality problems inside a cell are never errors; they are scored and
/// reported through feedback codes instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Invalid cell reference: {0}")]
    InvalidCellReference(String),
    #[error("Worksheet tab not found: {0}")]
    MissingTab(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
