//! Error types for the tunnel coordinator
//!
//! The coordinator-level variants (`Validation` through `LockTimeout`) form the
//! taxonomy callers branch on. The remaining variants are raised by individual
//! collaborators and reach callers either directly (pre-mutation reads) or
//! wrapped in `StepFailure` / `CompensationFailure`.

use crate::coordinator::Step;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for coordinator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before the lock was taken; nothing changed
    #[error("{0}")]
    Validation(String),

    /// A required precondition did not hold; nothing changed
    #[error("{0}")]
    Precondition(String),

    /// The hostname is already routed to a different target
    #[error("{hostname} is already mapped to {existing}; run `orb tunnel unexpose {subdomain}` first, or use a different subdomain")]
    Conflict {
        /// Full hostname
        hostname: String,
        /// Subdomain the caller asked for
        subdomain: String,
        /// Target currently configured
        existing: String,
    },

    /// A saga step failed and every earlier step was compensated
    #[error("{step} step failed (all earlier changes were rolled back): {source}")]
    StepFailure {
        /// Step that failed
        step: Step,
        /// Underlying collaborator error
        #[source]
        source: Box<Error>,
    },

    /// A saga step failed and the rollback did not complete
    #[error(
        "{failed_step} step failed ({cause}) and rollback did not complete; left inconsistent: {}",
        describe_unreverted(.unreverted)
    )]
    CompensationFailure {
        /// Step whose failure triggered the rollback
        failed_step: Step,
        /// Message of the original failure
        cause: String,
        /// Steps whose effects are still applied, each with the compensation error
        unreverted: Vec<(Step, String)>,
    },

    /// The host lock stayed held by another invocation past the timeout
    #[error("timed out after {waited:?} waiting for lock {}; another orb invocation may be stuck", .path.display())]
    LockTimeout {
        /// Lock file path
        path: PathBuf,
        /// How long we waited
        waited: Duration,
    },

    /// Requested object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operating system refused access
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A stored document could not be parsed
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    /// A structural invariant does not hold
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// The provider already holds a conflicting object
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Named access group does not resolve on the provider side
    #[error("access group {0:?} not found; create it first with `orb access create {0} <emails>`")]
    GroupNotFound(String),

    /// The service manager or the managed unit could not be found
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    /// Transport-level HTTP failure; the remote may or may not have applied the request
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn describe_unreverted(unreverted: &[(Step, String)]) -> String {
    unreverted
        .iter()
        .map(|(step, err)| format!("{} ({})", step.system(), err))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a permission error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a corruption error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Create an invariant violation
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create an "already exists" error
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an HTTP transport error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether the remote side may have applied the write despite the error.
    ///
    /// Transport failures and provider 5xx responses (both reported as `Http`)
    /// give no answer either way, so callers that must undo a write treat them
    /// as "maybe applied".
    pub fn is_indeterminate(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::StepFailure { source, .. } => source.is_indeterminate(),
            _ => false,
        }
    }

    /// Whether this failure left external systems inconsistent
    pub fn is_dirty(&self) -> bool {
        matches!(self, Error::CompensationFailure { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
