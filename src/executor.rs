//! Command execution with failures captured in the result.
//!
//! [`execute`] never returns an error: the outcome is encoded in
//! [`CommandResult::code`] so callers can branch on it directly.

use log::debug;
use serde::Serialize;

use crate::error::{ErrorKind, RouterError};
use crate::session::{Record, Session};

/// Outcome of one command.
///
/// `code == 0` means `stderr` is empty and `data` is the device reply;
/// otherwise `stderr` carries the reason.
#[derive(Debug, Default, Serialize)]
pub struct CommandResult {
    pub code: u8,
    pub stdout: String,
    pub stderr: String,
    pub data: Vec<Record>,
    /// Session error behind a failure, if there was one.
    #[serde(skip)]
    error: Option<RouterError>,
}

impl CommandResult {
    pub fn ok(data: Vec<Record>) -> Self {
        Self {
            code: 0,
            stdout: records_to_text(&data),
            stderr: String::new(),
            data,
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        let mut stderr = reason.into();
        if stderr.trim().is_empty() {
            stderr = "command failed".to_string();
        }
        Self {
            code: 1,
            stdout: String::new(),
            stderr,
            data: Vec::new(),
            error: None,
        }
    }

    fn from_error(error: RouterError) -> Self {
        let reason = error.to_string();
        Self {
            error: Some(error),
            ..Self::failed(reason)
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Category of the failure; `None` on success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        if self.is_success() {
            return None;
        }
        Some(self.error.as_ref().map_or(ErrorKind::Command, RouterError::kind))
    }

    /// Converts to a `Result`, naming `action` in the error.
    ///
    /// Device rejections become [`RouterError::Command`]; transport failures
    /// are returned as they were raised.
    pub fn into_records(self, action: &str) -> Result<Vec<Record>, RouterError> {
        if self.is_success() {
            return Ok(self.data);
        }
        match self.error {
            Some(error) if error.kind() != ErrorKind::Command => Err(error),
            _ => Err(RouterError::command(action, self.stderr)),
        }
    }
}

/// One `key=value` per line, records separated by an empty line.
pub fn records_to_text(records: &[Record]) -> String {
    records
        .iter()
        .map(|record| {
            record
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Runs `path` with `params` on `session`.
pub async fn execute<S>(session: &mut S, path: &str, params: &[String]) -> CommandResult
where
    S: Session + ?Sized,
{
    match session.call(path, params).await {
        Ok(records) => CommandResult::ok(records),
        Err(e) => {
            debug!("{} {} failed: {}", session.device_addr(), path, e);
            CommandResult::from_error(e)
        }
    }
}

/// Builds an `=key=value` attribute word.
pub fn attr(key: &str, value: impl AsRef<str>) -> String {
    format!("={key}={}", value.as_ref())
}

/// Builds a `?key=value` query word.
pub fn query(key: &str, value: impl AsRef<str>) -> String {
    format!("?{key}={}", value.as_ref())
}
