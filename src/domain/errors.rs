use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payment processor failure: {0}")]
    PaymentFailed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of the key-value cache store. Kept apart from [`DomainError`]
/// because cache failures are never fatal to the primary data path; callers
/// log them and fall back to computing directly.
#[derive(Debug, Error)]
#[error("cache store error: {0}")]
pub struct CacheError(pub String);
