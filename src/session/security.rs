use super::*;
use russh::keys::Algorithm;
use russh::{cipher, kex, mac};

/// Which SSH algorithm lists a router is offered.
///
/// RouterOS 6.x only negotiates SHA-1 key exchange, CBC ciphers and
/// `ssh-rsa` host keys; 7.x speaks the modern set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// RouterOS 7.x and later.
    Secure,
    /// RouterOS 6.x and 7.x.
    #[default]
    Balanced,
    /// Anything russh can negotiate, for pre-6.40 firmware.
    LegacyCompatible,
}

impl SecurityLevel {
    fn kex(self) -> &'static [kex::Name] {
        match self {
            SecurityLevel::Secure => config::SECURE_KEX_ORDER,
            SecurityLevel::Balanced => config::BALANCED_KEX_ORDER,
            SecurityLevel::LegacyCompatible => config::LEGACY_KEX_ORDER,
        }
    }

    fn host_keys(self) -> &'static [Algorithm] {
        match self {
            SecurityLevel::Secure => config::SECURE_KEY_TYPES,
            SecurityLevel::Balanced => config::BALANCED_KEY_TYPES,
            SecurityLevel::LegacyCompatible => config::LEGACY_KEY_TYPES,
        }
    }

    fn ciphers(self) -> &'static [cipher::Name] {
        match self {
            SecurityLevel::Secure => config::SECURE_CIPHERS,
            SecurityLevel::Balanced => config::BALANCED_CIPHERS,
            SecurityLevel::LegacyCompatible => config::LEGACY_CIPHERS,
        }
    }

    fn macs(self) -> &'static [mac::Name] {
        match self {
            SecurityLevel::Secure => config::SECURE_MAC_ALGORITHMS,
            SecurityLevel::Balanced => config::BALANCED_MAC_ALGORITHMS,
            SecurityLevel::LegacyCompatible => config::LEGACY_MAC_ALGORITHMS,
        }
    }
}

/// SSH policy shared by the console transport and the monitoring path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSecurityOptions {
    pub level: SecurityLevel,
    /// Host key verification.
    pub server_check: ServerCheckMethod,
}

impl Default for ConnectionSecurityOptions {
    fn default() -> Self {
        Self::router_default()
    }
}

impl ConnectionSecurityOptions {
    /// Balanced algorithms, host key not checked.
    ///
    /// Router host keys are never provisioned into a known-hosts file by the
    /// billing application.
    pub fn router_default() -> Self {
        Self {
            level: SecurityLevel::Balanced,
            server_check: ServerCheckMethod::NoCheck,
        }
    }

    /// Modern algorithms with `~/.ssh/known_hosts` verification.
    pub fn secure_default() -> Self {
        Self {
            level: SecurityLevel::Secure,
            server_check: ServerCheckMethod::DefaultKnownHostsFile,
        }
    }

    pub fn legacy_compatible() -> Self {
        Self {
            level: SecurityLevel::LegacyCompatible,
            server_check: ServerCheckMethod::NoCheck,
        }
    }

    pub fn with_level(mut self, level: SecurityLevel) -> Self {
        self.level = level;
        self
    }

    pub(crate) fn preferred(&self) -> Preferred {
        Preferred {
            kex: Cow::Borrowed(self.level.kex()),
            key: Cow::Borrowed(self.level.host_keys()),
            cipher: Cow::Borrowed(self.level.ciphers()),
            mac: Cow::Borrowed(self.level.macs()),
            compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
        }
    }

    /// Client configuration for `async-ssh2-tokio`.
    pub(crate) fn ssh_config(&self) -> async_ssh2_tokio::Config {
        async_ssh2_tokio::Config {
            preferred: self.preferred(),
            inactivity_timeout: Some(config::SSH_INACTIVITY_TIMEOUT),
            ..Default::default()
        }
    }
}
