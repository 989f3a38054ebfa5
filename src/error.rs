//! Error types for RouterOS sessions and PPPoE provisioning.
//!
//! Messages are shown verbatim in the billing dashboard, so their wording is
//! stable. Code that needs to branch on a failure should use
//! [`RouterError::kind`] instead of matching on the text.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable category of a [`RouterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The device could not be reached or refused the login.
    Connection,
    /// Connection establishment exceeded its timeout.
    Timeout,
    /// The device sent something the client could not decode.
    Protocol,
    /// The device rejected a command.
    Command,
    /// A PPPoE secret with the same name already exists.
    DuplicateUser,
    /// A PPPoE profile with the same name already exists.
    DuplicateProfile,
    /// No PPPoE secret matched any name candidate.
    SecretNotFound,
    /// No PPPoE profile matched any name candidate.
    ProfileNotFound,
    /// The caller passed an unusable value.
    InvalidInput,
    /// The session was already closed.
    Closed,
}

/// Errors raised by sessions, resolvers and lifecycle operations.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Connecting or logging in failed. Wraps the underlying cause.
    #[error("Gagal terhubung ke MikroTik: {0}")]
    Connect(Box<RouterError>),

    /// TCP connect or SSH handshake did not finish in time.
    #[error("connection timed out after {0} ms")]
    ConnectTimeout(u64),

    /// The device refused the login.
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// Malformed reply or framing.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The device answered a command with an error.
    #[error("Gagal {action}: {reason}")]
    Command { action: String, reason: String },

    /// Raw trap reply, before an operation attaches its action.
    #[error("{0}")]
    Trap(String),

    #[error("Username PPPoE \"{0}\" sudah digunakan di MikroTik")]
    DuplicateUser(String),

    #[error("Profile PPPoE \"{0}\" sudah ada di MikroTik")]
    DuplicateProfile(String),

    #[error("PPPoE secret \"{0}\" tidak ditemukan di MikroTik")]
    SecretNotFound(String),

    #[error("Profile PPPoE \"{0}\" tidak ditemukan di MikroTik")]
    ProfileNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The session has been closed.
    #[error("session closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred in the async-ssh2-tokio library.
    #[error("async ssh2 error: {0}")]
    Ssh2(#[from] async_ssh2_tokio::Error),

    /// An error occurred in the russh library.
    #[error("russh error: {0}")]
    Russh(#[from] russh::Error),
}

impl RouterError {
    /// Wraps an error raised while opening a session.
    pub fn connect(cause: RouterError) -> Self {
        match cause {
            already @ RouterError::Connect(_) => already,
            cause => RouterError::Connect(Box::new(cause)),
        }
    }

    /// Attaches the failed action to a device-side error.
    pub fn command(action: impl Into<String>, reason: impl Into<String>) -> Self {
        RouterError::Command {
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouterError::Connect(inner) => match inner.kind() {
                ErrorKind::Timeout => ErrorKind::Timeout,
                _ => ErrorKind::Connection,
            },
            RouterError::ConnectTimeout(_) => ErrorKind::Timeout,
            RouterError::LoginRejected(_) => ErrorKind::Connection,
            RouterError::Protocol(_) => ErrorKind::Protocol,
            RouterError::Command { .. } | RouterError::Trap(_) => ErrorKind::Command,
            RouterError::DuplicateUser(_) => ErrorKind::DuplicateUser,
            RouterError::DuplicateProfile(_) => ErrorKind::DuplicateProfile,
            RouterError::SecretNotFound(_) => ErrorKind::SecretNotFound,
            RouterError::ProfileNotFound(_) => ErrorKind::ProfileNotFound,
            RouterError::InvalidInput(_) => ErrorKind::InvalidInput,
            RouterError::Closed => ErrorKind::Closed,
            RouterError::Io(_) | RouterError::Ssh2(_) | RouterError::Russh(_) => {
                ErrorKind::Connection
            }
        }
    }

    /// JSON body for an API error response.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Error payload returned to HTTP clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_prefix_wraps_cause_once() {
        let err = RouterError::connect(RouterError::LoginRejected("invalid user".to_string()));
        let err = RouterError::connect(err);
        assert_eq!(
            err.to_string(),
            "Gagal terhubung ke MikroTik: login rejected: invalid user"
        );
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn connect_timeout_keeps_timeout_kind() {
        let err = RouterError::connect(RouterError::ConnectTimeout(15_000));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().starts_with("Gagal terhubung ke MikroTik"));
    }

    #[test]
    fn not_found_errors_are_distinct() {
        let secret = RouterError::SecretNotFound("john01".to_string());
        let profile = RouterError::ProfileNotFound("Premium".to_string());
        assert_ne!(secret.kind(), profile.kind());
        assert!(secret.to_string().contains("john01"));
        assert!(profile.to_string().contains("Premium"));
    }

    #[test]
    fn body_carries_kind_and_message() {
        let body = RouterError::DuplicateUser("Paket A".to_string()).body();
        assert_eq!(body.kind, ErrorKind::DuplicateUser);
        assert!(body.message.contains("sudah digunakan"));
    }
}
