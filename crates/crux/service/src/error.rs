//! Error types for crux-service

use crux_storage::StorageError;
use crux_verifier::VerifyError;
use thiserror::Error;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A schema, rule set or entity failed verification
    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),

    /// Storage error, passed through unchanged
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Bundle file could not be read or parsed
    #[error("bundle error: {0}")]
    Bundle(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rule set {0} calls itself through thenCall/elseCall")]
    CallCycle(String),

    #[error("{0} is not a workflow rule set")]
    NotAWorkflow(String),

    #[error("workflow {workflow} is bound to class {expected}, entity has class {actual}")]
    ClassMismatch {
        workflow: String,
        expected: String,
        actual: String,
    },

    #[error("no active workflow for class {class} in app {app} (slice {slice})")]
    AppNotFound { slice: i32, app: String, class: String },

    #[error("class {class} not found in app {app} (slice {slice})")]
    ClassNotFound { slice: i32, app: String, class: String },

    #[error("workflow {0} is not active")]
    WorkflowInactive(String),

    #[error("workflow {0} is internal and cannot be started directly")]
    WorkflowInternal(String),

    #[error("workflow instance {0} already exists")]
    InstanceExists(String),

    #[error("no workflow instance {0}")]
    InstanceNotFound(String),
}
