use super::*;
use async_ssh2_tokio::client::{AuthMethod, Client};

/// Captured output of one console command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: u32,
}

impl ShellOutput {
    /// Exit status 0 and nothing on stderr.
    pub fn is_clean(&self) -> bool {
        self.exit_status == 0 && self.stderr.trim().is_empty()
    }
}

/// A console on the device that runs literal command lines.
#[async_trait]
pub trait Shell: Send {
    async fn exec(&mut self, command: &str) -> Result<ShellOutput, RouterError>;

    /// Idempotent; errors are logged, never returned.
    async fn close(&mut self);

    fn device_addr(&self) -> &str;
}

/// RouterOS console reached over SSH exec channels.
pub struct SshShell {
    client: Client,
    device_addr: String,
    closed: bool,
}

impl SshShell {
    /// Connects and authenticates with password auth.
    ///
    /// `port` is passed explicitly because the monitoring path always uses
    /// SSH even for routers configured for the API.
    pub async fn open(
        credential: &DeviceCredential,
        port: u16,
        security: &ConnectionSecurityOptions,
    ) -> Result<Self, RouterError> {
        let device_addr = format!("{}@{}:{}", credential.username, credential.host, port);
        debug!(
            "{} opening SSH session (credential {})",
            device_addr,
            credential.fingerprint()
        );

        let client = with_connect_timeout(credential, async {
            Client::connect_with_config(
                (credential.host.clone(), port),
                &credential.username,
                AuthMethod::with_password(&credential.password),
                security.server_check.clone(),
                security.ssh_config(),
            )
            .await
            .map_err(RouterError::from)
        })
        .await?;
        debug!("{} SSH connection successful", device_addr);

        Ok(Self {
            client,
            device_addr,
            closed: false,
        })
    }

    pub fn is_connected(&self) -> bool {
        !self.closed && !self.client.is_closed()
    }
}

#[async_trait]
impl Shell for SshShell {
    async fn exec(&mut self, command: &str) -> Result<ShellOutput, RouterError> {
        if self.closed {
            return Err(RouterError::Closed);
        }
        debug!("{} ssh exec {}", self.device_addr, command);
        let result = self.client.execute(command).await?;
        trace!("{:?}", result.stdout);
        Ok(ShellOutput {
            stdout: result.stdout,
            stderr: result.stderr,
            exit_status: result.exit_status,
        })
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.client.disconnect().await {
            warn!("{} error closing SSH session: {}", self.device_addr, e);
        }
        debug!("{} SSH session closed", self.device_addr);
    }

    fn device_addr(&self) -> &str {
        &self.device_addr
    }
}
