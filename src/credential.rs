//! Device credentials as handed over by the billing application.
//!
//! The password arrives already decrypted; it is only held for the lifetime
//! of one operation and never written back anywhere by this crate.

use std::fmt;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config;

/// Management transport used to reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// RouterOS API (TCP 8728).
    #[default]
    Api,
    /// RouterOS CLI over SSH.
    Ssh,
}

/// Connection parameters for one router.
#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeviceCredential {
    pub host: String,
    /// Optional; see [`DeviceCredential::effective_port`].
    #[serde(default)]
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub protocol: Protocol,
    /// Connect timeout in milliseconds. Defaults to 15000.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl DeviceCredential {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: username.into(),
            password: password.into(),
            protocol: Protocol::Api,
            timeout_ms: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Port for the configured protocol, with the legacy `22` shim applied
    /// to the API transport.
    pub fn effective_port(&self) -> u16 {
        match self.protocol {
            Protocol::Api => config::resolve_api_port(self.port),
            Protocol::Ssh => config::resolve_ssh_port(self.port),
        }
    }

    /// Port used by the SSH monitoring path regardless of `protocol`.
    pub fn ssh_port(&self) -> u16 {
        match self.protocol {
            Protocol::Ssh => config::resolve_ssh_port(self.port),
            // An API record only stores the API port; SSH stays on 22.
            Protocol::Api => config::DEFAULT_SSH_PORT,
        }
    }

    pub fn connect_timeout_ms(&self) -> u64 {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .unwrap_or(config::DEFAULT_CONNECT_TIMEOUT_MS)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms())
    }

    /// `user@host:port`, used as the log key for a device.
    pub fn device_addr(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.effective_port())
    }

    /// Short SHA-256 digest of the password, safe to put in logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.password.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        hex::encode(&digest[..4])
    }
}

impl fmt::Debug for DeviceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCredential")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &format_args!("<redacted {}>", self.fingerprint()))
            .field("protocol", &self.protocol)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
