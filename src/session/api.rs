use super::protocol::{parse_reply, read_sentence, write_sentence};
use super::*;
use md5::{Digest, Md5};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Opens RouterOS API sessions over plain TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiConnector;

/// An authenticated RouterOS API connection.
///
/// Generic over the stream so tests can run it over an in-memory pipe.
pub struct ApiSession<S = TcpStream> {
    stream: S,
    device_addr: String,
    closed: bool,
}

#[async_trait]
impl Connector for ApiConnector {
    type Session = ApiSession;

    async fn connect(&self, credential: &DeviceCredential) -> Result<ApiSession, RouterError> {
        let device_addr = credential.device_addr();
        let port = credential.effective_port();
        debug!(
            "{} opening API session (credential {})",
            device_addr,
            credential.fingerprint()
        );

        with_connect_timeout(credential, async {
            let stream = TcpStream::connect((credential.host.as_str(), port)).await?;
            stream.set_nodelay(true)?;
            debug!("{} TCP connection successful", device_addr);
            ApiSession::login(
                stream,
                device_addr.clone(),
                &credential.username,
                &credential.password,
            )
            .await
        })
        .await
    }
}

impl<S> ApiSession<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    /// Authenticates on an already connected stream.
    ///
    /// Tries the RouterOS 6.43+ plain login first. Older firmware answers it
    /// with an MD5 challenge in `=ret=`, which is then answered in a second
    /// round.
    pub async fn login(
        stream: S,
        device_addr: String,
        username: &str,
        password: &str,
    ) -> Result<Self, RouterError> {
        let mut session = Self {
            stream,
            device_addr,
            closed: false,
        };

        let words = vec![
            "/login".to_string(),
            format!("=name={username}"),
            format!("=password={password}"),
        ];
        let done = session.login_round(&words).await?;

        if let Some(challenge) = done.get("ret") {
            debug!("{} legacy challenge login", session.device_addr);
            let response = challenge_response(password, challenge)?;
            let words = vec![
                "/login".to_string(),
                format!("=name={username}"),
                format!("=response=00{response}"),
            ];
            session.login_round(&words).await?;
        }

        debug!("{} API login successful", session.device_addr);
        Ok(session)
    }

    async fn login_round(&mut self, words: &[String]) -> Result<Record, RouterError> {
        write_sentence(&mut self.stream, words).await?;
        loop {
            let sentence = read_sentence(&mut self.stream).await?;
            match parse_reply(&sentence)? {
                Reply::Done(record) => return Ok(record),
                Reply::Trap(record) => {
                    return Err(RouterError::LoginRejected(
                        record.get_or_empty("message").to_string(),
                    ));
                }
                Reply::Fatal(message) => {
                    self.closed = true;
                    return Err(RouterError::LoginRejected(message));
                }
                Reply::Re(_) | Reply::Empty => continue,
            }
        }
    }

    /// Sends one command and collects the reply.
    pub async fn call(&mut self, path: &str, params: &[String]) -> Result<Vec<Record>, RouterError> {
        if self.closed {
            return Err(RouterError::Closed);
        }
        debug!("{} api {}", self.device_addr, path);

        let mut words = Vec::with_capacity(params.len() + 1);
        words.push(path);
        words.extend(params.iter().map(String::as_str));
        write_sentence(&mut self.stream, &words).await?;

        let mut records = Vec::new();
        let mut trap: Option<String> = None;
        loop {
            let sentence = read_sentence(&mut self.stream).await?;
            match parse_reply(&sentence)? {
                Reply::Re(record) => records.push(record),
                Reply::Empty => {}
                Reply::Trap(record) => {
                    // a !done still follows the trap
                    trap = Some(record.get_or_empty("message").to_string());
                }
                Reply::Done(record) => {
                    // `add` reports the new item id as `=ret=`
                    if record.get("ret").is_some() {
                        records.push(record);
                    }
                    break;
                }
                Reply::Fatal(message) => {
                    self.closed = true;
                    return Err(RouterError::Protocol(format!("device closed session: {message}")));
                }
            }
        }

        match trap {
            Some(message) => Err(RouterError::Trap(message)),
            None => Ok(records),
        }
    }

    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = write_sentence(&mut self.stream, &["/quit"]).await {
            warn!("{} failed to send /quit: {}", self.device_addr, e);
        }
        if let Err(e) = self.stream.shutdown().await {
            warn!("{} error closing API session: {}", self.device_addr, e);
        }
        debug!("{} API session closed", self.device_addr);
    }

    pub fn device_addr(&self) -> &str {
        &self.device_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl<S> Session for ApiSession<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    async fn call(&mut self, path: &str, params: &[String]) -> Result<Vec<Record>, RouterError> {
        ApiSession::call(self, path, params).await
    }

    async fn close(&mut self) {
        ApiSession::close(self).await
    }

    fn device_addr(&self) -> &str {
        &self.device_addr
    }
}

/// `md5(0x00 ++ password ++ challenge)` as lower-case hex.
fn challenge_response(password: &str, challenge_hex: &str) -> Result<String, RouterError> {
    let challenge = hex::decode(challenge_hex)
        .map_err(|e| RouterError::Protocol(format!("bad login challenge: {e}")))?;
    let mut hasher = Md5::new();
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    hasher.update(&challenge);
    Ok(hex::encode(hasher.finalize()))
}
