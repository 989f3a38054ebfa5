use std::collections::HashSet;

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::parse::{
    self, Bandwidth, ConsoleSecret, IpPool, SystemInfo, parse_active_names, parse_monitor_traffic,
    parse_pool_details, parse_pool_table, parse_secret_details, parse_secret_terse,
    parse_system_resource,
};
use crate::credential::DeviceCredential;
use crate::error::RouterError;
use crate::session::{ConnectionSecurityOptions, Shell, SshShell};

/// One command variant and the parser for its output.
pub struct Attempt<T> {
    pub command: String,
    pub parse: fn(&str) -> Option<T>,
}

impl<T> Attempt<T> {
    pub fn new(command: impl Into<String>, parse: fn(&str) -> Option<T>) -> Self {
        Self {
            command: command.into(),
            parse,
        }
    }
}

/// Runs `attempts` in order and returns the first parsed result.
///
/// A variant is skipped when the console reports an error (stderr, non-zero
/// exit, or an error line on stdout) or when its parser recognises nothing.
/// Transport failures abort the chain.
pub async fn run_chain<S, T>(shell: &mut S, attempts: &[Attempt<T>]) -> Result<Option<T>, RouterError>
where
    S: Shell + ?Sized,
{
    for attempt in attempts {
        let output = shell.exec(&attempt.command).await?;
        if !output.is_clean() || parse::error_line(&output.stdout).is_some() {
            debug!(
                "{} '{}' rejected, trying next variant",
                shell.device_addr(),
                attempt.command
            );
            continue;
        }
        match (attempt.parse)(&output.stdout) {
            Some(value) => return Ok(Some(value)),
            None => debug!(
                "{} '{}' output not recognised, trying next variant",
                shell.device_addr(),
                attempt.command
            ),
        }
    }
    Ok(None)
}

/// Current rates of `interface`; zeros when no variant yields rates.
pub async fn bandwidth<S: Shell + ?Sized>(
    shell: &mut S,
    interface: &str,
) -> Result<Bandwidth, RouterError> {
    let name = quote_name(interface);
    let attempts = [
        Attempt::new(
            format!("/interface monitor-traffic {name} once"),
            parse_monitor_traffic,
        ),
        Attempt::new(
            format!("/interface monitor-traffic interface={name} once"),
            parse_monitor_traffic,
        ),
        Attempt::new(
            format!("/interface monitor-traffic {name} once as-value"),
            parse_monitor_traffic,
        ),
    ];
    let mut bw = run_chain(shell, &attempts).await?.unwrap_or_default();
    if bw.interface.is_empty() {
        bw.interface = interface.to_string();
    }
    Ok(bw)
}

/// Configured IP pools; empty when no variant yields pools.
pub async fn list_pools<S: Shell + ?Sized>(shell: &mut S) -> Result<Vec<IpPool>, RouterError> {
    let attempts = [
        Attempt::new("/ip pool print detail without-paging", parse_pool_details),
        Attempt::new("/ip pool print detail", parse_pool_details),
        Attempt::new("/ip pool print without-paging", parse_pool_table),
        Attempt::new("/ip pool print", parse_pool_table),
    ];
    Ok(run_chain(shell, &attempts).await?.unwrap_or_default())
}

/// System resource summary; zeroed when no variant yields fields.
pub async fn system_info<S: Shell + ?Sized>(shell: &mut S) -> Result<SystemInfo, RouterError> {
    let attempts = [
        Attempt::new("/system resource print without-paging", parse_system_resource),
        Attempt::new("/system resource print", parse_system_resource),
    ];
    Ok(run_chain(shell, &attempts).await?.unwrap_or_default())
}

/// A secret together with its online state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecretStatus {
    pub name: String,
    pub service: String,
    pub profile: String,
    pub disabled: bool,
    pub online: bool,
    pub last_logged_out: Option<String>,
    pub comment: Option<String>,
}

/// All PPP secrets with an online flag from the active list.
pub async fn secrets_status<S: Shell + ?Sized>(
    shell: &mut S,
) -> Result<Vec<SecretStatus>, RouterError> {
    let secret_attempts = [
        Attempt::new("/ppp secret print detail without-paging", parse_secret_details),
        Attempt::new("/ppp secret print detail", parse_secret_details),
        Attempt::new("/ppp secret print terse without-paging", parse_secret_terse),
    ];
    let secrets: Vec<ConsoleSecret> = run_chain(shell, &secret_attempts)
        .await?
        .unwrap_or_default();
    if secrets.is_empty() {
        return Ok(Vec::new());
    }

    let active_attempts = [
        Attempt::new("/ppp active print detail without-paging", parse_active_names),
        Attempt::new("/ppp active print detail", parse_active_names),
        Attempt::new("/ppp active print", parse_active_names),
    ];
    let online: HashSet<String> = run_chain(shell, &active_attempts)
        .await?
        .unwrap_or_default();

    Ok(secrets
        .into_iter()
        .map(|s| SecretStatus {
            online: online.contains(&s.name),
            name: s.name,
            service: s.service,
            profile: s.profile,
            disabled: s.disabled,
            last_logged_out: s.last_logged_out,
            comment: s.comment,
        })
        .collect())
}

fn quote_name(name: &str) -> String {
    if name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Read-only polling over SSH.
///
/// Every call opens its own SSH session and closes it before returning.
#[derive(Debug, Clone, Default)]
pub struct LegacyMonitor {
    security: ConnectionSecurityOptions,
}

impl LegacyMonitor {
    pub fn new(security: ConnectionSecurityOptions) -> Self {
        Self { security }
    }

    async fn open(&self, credential: &DeviceCredential) -> Result<SshShell, RouterError> {
        SshShell::open(credential, credential.ssh_port(), &self.security)
            .await
            .map_err(RouterError::connect)
    }

    pub async fn bandwidth(
        &self,
        credential: &DeviceCredential,
        interface: &str,
    ) -> Result<Bandwidth, RouterError> {
        let mut shell = self.open(credential).await?;
        let result = bandwidth(&mut shell, interface).await;
        shell.close().await;
        result
    }

    pub async fn list_pools(&self, credential: &DeviceCredential) -> Result<Vec<IpPool>, RouterError> {
        let mut shell = self.open(credential).await?;
        let result = list_pools(&mut shell).await;
        shell.close().await;
        result
    }

    pub async fn system_info(&self, credential: &DeviceCredential) -> Result<SystemInfo, RouterError> {
        let mut shell = self.open(credential).await?;
        let result = system_info(&mut shell).await;
        shell.close().await;
        result
    }

    pub async fn secrets_status(
        &self,
        credential: &DeviceCredential,
    ) -> Result<Vec<SecretStatus>, RouterError> {
        let mut shell = self.open(credential).await?;
        let result = secrets_status(&mut shell).await;
        shell.close().await;
        result
    }
}
