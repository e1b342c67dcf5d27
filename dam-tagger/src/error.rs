//! Error types for dam-tagger
//!
//! `AuthError` covers the login exchange; `RemoteError` covers everything that
//! talks to the DAM after that, plus the resolution and assignment failures
//! built on top of it.

use thiserror::Error;

/// Login failed or no credentials are available
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Authentication failed: {reason}")]
pub struct AuthError {
    /// Human-readable cause (never contains the secret)
    pub reason: String,
    /// HTTP status returned by the login endpoint, if one was received
    pub remote_status: Option<u16>,
}

impl AuthError {
    pub fn new(reason: impl Into<String>, remote_status: Option<u16>) -> Self {
        Self {
            reason: reason.into(),
            remote_status,
        }
    }
}

/// Remote call and resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Network error calling {endpoint}: {reason}")]
    Network { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    /// 401/403 while presenting a credential
    #[error("Authentication required (HTTP {status}) for {endpoint}")]
    Unauthorized { status: u16, endpoint: String },

    /// 409 - the entity already exists remotely
    #[error("Conflict reported by {endpoint}")]
    Conflict { endpoint: String },

    /// Any other non-2xx response. The body is logged, not carried.
    #[error("Remote returned HTTP {status} for {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("Malformed response from {endpoint}: {reason}")]
    Parse { endpoint: String, reason: String },

    #[error("Failed to create tag '{name}': {reason}")]
    TagCreationFailed { name: String, reason: String },

    #[error("Failed to create value '{value}' under tag '{tag}': {reason}")]
    TagValueCreationFailed {
        tag: String,
        value: String,
        reason: String,
    },

    #[error("Tag '{name}' does not allow assignment")]
    TagNotAssignable { name: String },

    #[error("Failed to assign tags to media '{media_id}': {reason}")]
    AssignmentFailed { media_id: String, reason: String },

    #[error("No tags could be resolved for media '{media_id}' ({skipped} skipped)")]
    NothingToAssign { media_id: String, skipped: usize },

    #[error("Media query rejected by the DAM: {0}")]
    QueryRejected(String),

    #[error("Invalid tag name: '{0}'")]
    InvalidTagName(String),

    #[error("Invalid value '{value}' for tag '{tag}'")]
    InvalidTagValue { tag: String, value: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl RemoteError {
    /// Classify a reqwest failure (timeout vs. everything else)
    pub fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            RemoteError::Network {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// HTTP status carried by the error, if any
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            RemoteError::Unauthorized { status, .. } | RemoteError::Status { status, .. } => {
                Some(*status)
            }
            RemoteError::Conflict { .. } => Some(409),
            RemoteError::Auth(e) => e.remote_status,
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RemoteError::Unauthorized { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Conflict { .. })
    }

    /// Login failed, or the DAM kept rejecting the credential after a re-login
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, RemoteError::Auth(_) | RemoteError::Unauthorized { .. })
    }

    /// Errors that end a whole assignment call rather than a single tag
    pub fn is_fatal_for_batch(&self) -> bool {
        self.is_auth_failure() || matches!(self, RemoteError::Cancelled)
    }
}
