use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while loading modules or running them against a target.
///
/// Every variant is local to one module or one (module, URL) unit: callers
/// log it and move on, siblings are never aborted.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The module file is unreadable as a module or breaks a structural rule.
    #[error("invalid module '{module}': {reason}")]
    Validation { module: String, reason: String },

    #[error("failed to read module file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build request: {0}")]
    RequestBuild(String),

    /// Connection or timeout failure while exchanging the request.
    #[error("request failed: {0}")]
    Transport(#[source] BoxError),

    #[error("failed to evaluate matches: {0}")]
    Evaluation(String),
}

impl ScanError {
    pub fn validation(module: impl Into<String>, reason: impl Into<String>) -> Self {
        ScanError::Validation {
            module: module.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(err: impl Into<BoxError>) -> Self {
        ScanError::Transport(err.into())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
