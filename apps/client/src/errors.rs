use thiserror::Error;

use crate::api::ApiError;
use crate::workflow::state::Operation;

/// Workflow-level error taxonomy. Every failed command surfaces as exactly
/// one of these; the presentation layer renders them, nothing is swallowed.
///
/// `Validation`, `Precondition` and `Busy` are resolved locally and issue no
/// network call. The remaining variants classify a failed remote call.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Precondition(String),

    #[error("{0} already in progress")]
    Busy(Operation),

    #[error("network error: {0}")]
    Network(String),

    #[error("server rejected the request (status {status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("session expired, please log in again")]
    Auth,
}

impl From<ApiError> for WorkflowError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(e) => WorkflowError::Network(e.to_string()),
            ApiError::Server { status, detail } => WorkflowError::Server { status, detail },
            ApiError::Auth => WorkflowError::Auth,
        }
    }
}
