use super::shell::{Shell, SshShell};
use super::*;
use crate::legacy::parse::{error_line, parse_terse_line};

/// Opens console sessions over SSH that accept API-style commands.
#[derive(Debug, Clone, Default)]
pub struct CliConnector {
    security: ConnectionSecurityOptions,
}

impl CliConnector {
    pub fn new(security: ConnectionSecurityOptions) -> Self {
        Self { security }
    }
}

#[async_trait]
impl Connector for CliConnector {
    type Session = CliSession;

    async fn connect(&self, credential: &DeviceCredential) -> Result<CliSession, RouterError> {
        let shell = SshShell::open(credential, credential.effective_port(), &self.security).await?;
        Ok(CliSession::new(shell))
    }
}

/// Runs structured commands by translating them into console lines.
pub struct CliSession<S = SshShell> {
    shell: S,
}

impl<S: Shell> CliSession<S> {
    pub fn new(shell: S) -> Self {
        Self { shell }
    }

    pub fn into_inner(self) -> S {
        self.shell
    }
}

#[async_trait]
impl<S: Shell> Session for CliSession<S> {
    async fn call(&mut self, path: &str, params: &[String]) -> Result<Vec<Record>, RouterError> {
        let variants = translate_command(path, params)?;
        let is_print = path.ends_with("/print");
        let mut last_error = None;

        for (idx, line) in variants.iter().enumerate() {
            let output = self.shell.exec(line).await?;
            match interpret(&output, is_print) {
                Ok(records) => return Ok(records),
                Err(e) => {
                    if idx + 1 < variants.len() {
                        debug!(
                            "{} variant '{}' failed ({}), trying next",
                            self.shell.device_addr(),
                            line,
                            e
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RouterError::Trap("no command variant".to_string())))
    }

    async fn close(&mut self) {
        self.shell.close().await
    }

    fn device_addr(&self) -> &str {
        self.shell.device_addr()
    }
}

/// Turns console output into records or a trap error.
fn interpret(output: &ShellOutput, is_print: bool) -> Result<Vec<Record>, RouterError> {
    if let Some(line) = error_line(&output.stderr).or_else(|| error_line(&output.stdout)) {
        return Err(RouterError::Trap(line.to_string()));
    }
    if !output.stderr.trim().is_empty() {
        return Err(RouterError::Trap(output.stderr.trim().to_string()));
    }
    if !is_print {
        // add/set/remove are silent on success; `add` may echo the new id
        let text = output.stdout.trim();
        if !text.is_empty() && !text.starts_with('*') {
            return Err(RouterError::Trap(text.to_string()));
        }
        let mut record = Record::new();
        if !text.is_empty() {
            record.insert("ret", text);
        }
        return Ok(if record.is_empty() { Vec::new() } else { vec![record] });
    }
    Ok(output.stdout.lines().filter_map(parse_terse_line).collect())
}

/// Quotes a value for the RouterOS console.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' | '$' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Item reference: internal ids are used as is, names go through `find`.
fn item_ref(value: &str) -> String {
    if value.starts_with('*') && value.len() > 1 {
        value.to_string()
    } else {
        format!("[find name={}]", quote(value))
    }
}

/// Translates an API command into console lines, most specific first.
///
/// `print` gets two variants: with `show-ids` (RouterOS 7) so rows carry
/// their `.id`, and without it for 6.x, which rejects the flag. On
/// `/interface` the `print stats` pair comes first so rows carry the byte and
/// packet counters.
pub fn translate_command(path: &str, params: &[String]) -> Result<Vec<String>, RouterError> {
    let trimmed = path.trim_matches('/');
    let (menu, verb) = trimmed
        .rsplit_once('/')
        .ok_or_else(|| RouterError::InvalidInput(format!("command path {path}")))?;
    if menu.is_empty() || verb.is_empty() {
        return Err(RouterError::InvalidInput(format!("command path {path}")));
    }
    let menu = format!("/{}", menu.replace('/', " "));

    let mut item: Option<String> = None;
    let mut attrs: Vec<String> = Vec::new();
    let mut filters: Vec<String> = Vec::new();

    for word in params {
        if let Some(attr) = word.strip_prefix('=') {
            let (key, value) = attr.split_once('=').unwrap_or((attr, ""));
            match key {
                ".id" | "numbers" => item = Some(item_ref(value)),
                ".proplist" => {}
                _ => attrs.push(format!("{key}={}", quote(value))),
            }
        } else if let Some(query) = word.strip_prefix('?') {
            match query.split_once('=') {
                Some((key, value)) => filters.push(format!("{key}={}", quote(value))),
                None => {
                    return Err(RouterError::InvalidInput(format!(
                        "unsupported query word {word}"
                    )));
                }
            }
        } else {
            return Err(RouterError::InvalidInput(format!("unsupported word {word}")));
        }
    }

    if verb == "print" {
        let where_clause = if filters.is_empty() {
            String::new()
        } else {
            format!(" where {}", filters.join(" and "))
        };
        // interface counters only show up under `print stats`
        let modes: &[&str] = if menu == "/interface" {
            &["print stats", "print"]
        } else {
            &["print"]
        };
        return Ok(modes
            .iter()
            .flat_map(|mode| {
                [
                    format!("{menu} {mode} terse show-ids without-paging{where_clause}"),
                    format!("{menu} {mode} terse without-paging{where_clause}"),
                ]
            })
            .collect());
    }

    let mut line = format!("{menu} {verb}");
    if let Some(item) = item {
        line.push(' ');
        line.push_str(&item);
    }
    for attr in attrs {
        line.push(' ');
        line.push_str(&attr);
    }
    Ok(vec![line])
}
