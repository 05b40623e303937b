use thiserror::Error;

use crate::domain::answer::Rejection;
use crate::executor::ExecutorError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("question rejected: {}", .0.reason)]
    Rejected(Rejection),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error("internal invariant violation: {0}")]
    InvariantViolation(String),
}

impl PipelineError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Rejected(_) => "validation_failure",
            Self::Executor(_) => "executor_failure",
            Self::InvariantViolation(_) => "internal_invariant_violation",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn unknown_store(domain: &str, correlation_id: impl Into<String>) -> Self {
        Self::NotFound {
            message: format!("store `{domain}` is not registered"),
            correlation_id: correlation_id.into(),
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The question could not be answered as asked. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested store is not known to this service.",
            Self::ServiceUnavailable { .. } => {
                "The store data source is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<PipelineError> for InterfaceError {
    fn from(value: PipelineError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            PipelineError::InvalidInput(message) => Self::BadRequest { message, correlation_id },
            PipelineError::Rejected(rejection) => {
                Self::BadRequest { message: rejection.user_message(), correlation_id }
            }
            PipelineError::Executor(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            PipelineError::InvariantViolation(_) => Self::Internal {
                message: "query planning failed".to_owned(),
                correlation_id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::answer::Rejection;
    use crate::domain::intent::Category;
    use crate::errors::{InterfaceError, PipelineError};
    use crate::executor::ExecutorError;

    #[test]
    fn rejection_maps_to_bad_request_with_reason() {
        let interface = PipelineError::Rejected(Rejection {
            reason: "unsafe operation: `DROP` is not permitted".to_owned(),
            checks: vec!["blocked_keywords".to_owned()],
            intent: Category::General,
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert!(interface.message().contains("unsafe operation"));
        assert_eq!(interface.status_code(), 400);
    }

    #[test]
    fn executor_failure_maps_to_service_unavailable() {
        let interface = PipelineError::from(ExecutorError::Timeout { timeout_secs: 10 })
            .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.status_code(), 503);
        assert_eq!(
            interface.user_message(),
            "The store data source is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn invariant_violation_maps_to_internal_without_leaking_detail() {
        let interface =
            PipelineError::InvariantViolation("sales/repeat_customers has no plan".to_owned())
                .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.status_code(), 500);
        assert!(!interface.message().contains("repeat_customers"));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn unknown_store_is_not_found() {
        let interface = InterfaceError::unknown_store("ghost.example", "req-4");
        assert_eq!(interface.status_code(), 404);
        assert_eq!(interface.correlation_id(), "req-4");
        assert!(interface.message().contains("ghost.example"));
    }
}
