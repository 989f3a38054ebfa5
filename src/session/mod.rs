//! Device sessions and the transports behind them.
//!
//! A session runs structured RouterOS commands: a menu path such as
//! `/ppp/secret/add` plus `=key=value` attribute words and `?key=value`
//! query words. Two transports implement it:
//!
//! - [`ApiConnector`] speaks the binary RouterOS API on TCP 8728.
//! - [`CliConnector`] drives the RouterOS console over SSH and translates
//!   the same commands into CLI lines.
//!
//! [`RouterConnector`] picks one of them from [`DeviceCredential::protocol`].
//! Sessions are never pooled: every operation opens its own and closes it
//! before returning.
//!
//! # Main Components
//!
//! - [`Connector`] / [`Session`] - transport traits injected into the PPPoE client
//! - [`Record`] - one reply row, keys kept in device order
//! - [`ConnectionSecurityOptions`] - SSH algorithm policy

use async_ssh2_tokio::ServerCheckMethod;
use async_trait::async_trait;
use log::{debug, trace, warn};
use russh::Preferred;
use schemars::JsonSchema;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::config;
use crate::credential::{DeviceCredential, Protocol};
use crate::error::RouterError;

pub use api::{ApiConnector, ApiSession};
pub use cli::{CliConnector, CliSession, translate_command};
pub use protocol::{Reply, encode_length};
pub use security::{ConnectionSecurityOptions, SecurityLevel};
pub use shell::{Shell, ShellOutput, SshShell};

/// One reply row. Keys keep the order the device sent them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record(Vec<(String, String)>);

impl Record {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Sets `key`, replacing an earlier value for the same key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of `key`, or an empty string.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    /// Numeric value of `key`; missing or malformed values read as 0.
    pub fn get_u64(&self, key: &str) -> u64 {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0)
    }

    /// RouterOS boolean (`true`/`yes`).
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some("true") | Some("yes"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// An open, authenticated device session.
#[async_trait]
pub trait Session: Send {
    /// Runs one command and returns every reply record.
    ///
    /// `params` are API words: `=key=value` sets an attribute,
    /// `?key=value` filters a `print`.
    async fn call(&mut self, path: &str, params: &[String]) -> Result<Vec<Record>, RouterError>;

    /// Tears the session down. Idempotent; errors are logged, never returned.
    async fn close(&mut self);

    /// `user@host:port` of the peer.
    fn device_addr(&self) -> &str;
}

/// Opens sessions. Injected into [`crate::pppoe::PppoeClient`].
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    /// Opens an authenticated session or fails; never yields a half-open handle.
    async fn connect(&self, credential: &DeviceCredential) -> Result<Self::Session, RouterError>;
}

/// Connector that chooses the transport from the credential's protocol.
#[derive(Debug, Clone, Default)]
pub struct RouterConnector {
    api: ApiConnector,
    cli: CliConnector,
}

impl RouterConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `security` for SSH-based sessions.
    pub fn with_security(security: ConnectionSecurityOptions) -> Self {
        Self {
            api: ApiConnector,
            cli: CliConnector::new(security),
        }
    }
}

/// Session returned by [`RouterConnector`].
pub enum RouterSession {
    Api(ApiSession),
    Cli(CliSession),
}

#[async_trait]
impl Session for RouterSession {
    async fn call(&mut self, path: &str, params: &[String]) -> Result<Vec<Record>, RouterError> {
        match self {
            RouterSession::Api(session) => session.call(path, params).await,
            RouterSession::Cli(session) => session.call(path, params).await,
        }
    }

    async fn close(&mut self) {
        match self {
            RouterSession::Api(session) => session.close().await,
            RouterSession::Cli(session) => session.close().await,
        }
    }

    fn device_addr(&self) -> &str {
        match self {
            RouterSession::Api(session) => session.device_addr(),
            RouterSession::Cli(session) => session.device_addr(),
        }
    }
}

#[async_trait]
impl Connector for RouterConnector {
    type Session = RouterSession;

    async fn connect(&self, credential: &DeviceCredential) -> Result<RouterSession, RouterError> {
        match credential.protocol {
            Protocol::Api => self.api.connect(credential).await.map(RouterSession::Api),
            Protocol::Ssh => self.cli.connect(credential).await.map(RouterSession::Cli),
        }
    }
}

/// Runs `fut` under the credential's connect timeout.
pub(crate) async fn with_connect_timeout<T, F>(
    credential: &DeviceCredential,
    fut: F,
) -> Result<T, RouterError>
where
    F: std::future::Future<Output = Result<T, RouterError>>,
{
    match tokio::time::timeout(credential.connect_timeout(), fut).await {
        Ok(result) => result,
        Err(_) => Err(RouterError::ConnectTimeout(credential.connect_timeout_ms())),
    }
}

mod api;
mod cli;
mod protocol;
mod security;
mod shell;
