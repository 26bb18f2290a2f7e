use thiserror::Error;

/// Failures of the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl StoreError {
    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Failures talking to the external classification service.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier not configured")]
    NotConfigured,
    #[error("classifier timed out after {0}ms")]
    Timeout(u128),
    #[error("classifier request failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event delivery failed: {0}")]
    Delivery(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced to the citizen-facing API.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("invalid submission: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("complaint could not be saved, please retry: {0}")]
    Persistence(#[from] StoreError),
}

impl IntakeError {
    pub fn status_code(&self) -> u16 {
        match self {
            IntakeError::Validation(_) => 400,
            IntakeError::NotFound(_) => 404,
            IntakeError::Conflict(_) => 409,
            IntakeError::Persistence(_) => 503,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, IntakeError::Persistence(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intake_error_status_codes() {
        assert_eq!(IntakeError::Validation("x".into()).status_code(), 400);
        assert_eq!(IntakeError::NotFound("complaint".into()).status_code(), 404);
        let err: IntakeError = StoreError::Backend("throttled".into()).into();
        assert_eq!(err.status_code(), 503);
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "complaint could not be saved, please retry: storage backend error: throttled"
        );
    }
}
