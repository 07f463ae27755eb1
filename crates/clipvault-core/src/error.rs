use crate::access::AccessState;

pub type VaultResult<T> = std::result::Result<T, VaultError>;

/// Errors surfaced by vault operations.
///
/// Every variant leaves the vault in the state it had before the call.
/// Storage corruption and mirror failures never reach the caller; they are
/// logged where they happen.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("nothing to capture")]
    EmptyInput,
    #[error("content already captured")]
    DuplicateContent,
    #[error("classification failed: {0}")]
    ClassificationFailed(String),
    /// Deliberately generic: never says which field was wrong.
    #[error("authentication failed")]
    AuthFailed,
    #[error("operation requires {required:?} access (current: {current:?})")]
    AccessDenied {
        required: AccessState,
        current: AccessState,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage: {0}")]
    Storage(String),
}

impl VaultError {
    pub fn invalid(message: impl Into<String>) -> Self {
        VaultError::InvalidInput(message.into())
    }
}
