use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failures of a single Identity Backend call.
///
/// None of these ever escape the session guard: every variant resolves the
/// session to `Unauthenticated` and survives only as a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The backend could not be reached (connect, DNS, TLS, body read).
    #[error("identity backend unreachable: {0}")]
    Transport(String),

    /// The backend did not answer within the configured bound.
    #[error("identity backend timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with a status that says nothing about the session.
    #[error("identity backend returned status {0}")]
    Unavailable(u16),

    /// The backend explicitly rejected the session (401/403).
    #[error("session rejected by identity backend (status {0})")]
    Rejected(u16),

    /// A success status with a body that does not describe a complete admin.
    #[error("malformed session response: {0}")]
    Malformed(String),
}

/// The two failure classes consumers may distinguish for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TransportFailure,
    AuthRejected,
}

impl IdentityError {
    pub fn kind(&self) -> FailureKind {
        match self {
            IdentityError::Transport(_)
            | IdentityError::Timeout(_)
            | IdentityError::Unavailable(_) => FailureKind::TransportFailure,
            IdentityError::Rejected(_) | IdentityError::Malformed(_) => FailureKind::AuthRejected,
        }
    }
}

/// The last failure recorded on a session, kept for logging only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionError {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&IdentityError> for SessionError {
    fn from(err: &IdentityError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
