#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rosnet::credential::DeviceCredential;
use rosnet::error::RouterError;
use rosnet::session::{Connector, Record, Session};

/// In-memory device: PPP tables, interfaces and call bookkeeping.
#[derive(Debug, Default)]
pub struct RouterState {
    pub secrets: Vec<Record>,
    pub profiles: Vec<Record>,
    pub active: Vec<Record>,
    pub interfaces: Vec<Record>,
    pub identity: Record,
    pub resource: Record,
    /// Every command seen, as `(path, params)`.
    pub calls: Vec<(String, Vec<String>)>,
    pub opened: usize,
    pub closed: usize,
    /// When set, `connect` fails with this login error.
    pub refuse_login: Option<String>,
    /// Commands on this path answer with a trap.
    pub trap_on: Option<String>,
    next_id: u32,
}

impl RouterState {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("*{:X}", self.next_id)
    }

    fn table(&mut self, menu: &str) -> Option<&mut Vec<Record>> {
        match menu {
            "/ppp/secret" => Some(&mut self.secrets),
            "/ppp/profile" => Some(&mut self.profiles),
            "/ppp/active" => Some(&mut self.active),
            "/interface" => Some(&mut self.interfaces),
            _ => None,
        }
    }

    /// Paths of every command seen.
    pub fn paths(&self) -> Vec<&str> {
        self.calls.iter().map(|(path, _)| path.as_str()).collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.calls.iter().filter(|(p, _)| p == path).count()
    }

    pub fn secret(&self, name: &str) -> Option<&Record> {
        self.secrets.iter().find(|r| r.get("name") == Some(name))
    }
}

/// Connector over a shared [`RouterState`].
#[derive(Debug, Clone, Default)]
pub struct FakeRouter {
    state: Arc<Mutex<RouterState>>,
}

impl FakeRouter {
    pub fn new() -> Self {
        let router = Self::default();
        {
            let mut state = router.state();
            state.identity = [("name", "core-router")].into_iter().collect();
            state.resource = [
                ("version", "7.14.3 (stable)"),
                ("board-name", "CCR1036-8G-2S+"),
                ("uptime", "3w2d4h"),
            ]
            .into_iter()
            .collect();
        }
        router
    }

    pub fn state(&self) -> MutexGuard<'_, RouterState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn with_profile(self, name: &str) -> Self {
        {
            let mut state = self.state();
            let id = state.next_id();
            state.profiles.push(
                [(".id", id.as_str()), ("name", name), ("remote-address", "pool-pppoe")]
                    .into_iter()
                    .collect(),
            );
        }
        self
    }

    pub fn with_secret(self, name: &str, profile: &str) -> Self {
        {
            let mut state = self.state();
            let id = state.next_id();
            state.secrets.push(
                [
                    (".id", id.as_str()),
                    ("name", name),
                    ("password", "rahasia"),
                    ("profile", profile),
                    ("service", "pppoe"),
                    ("disabled", "false"),
                ]
                .into_iter()
                .collect(),
            );
        }
        self
    }

    /// Marks `name` online and creates its `<pppoe-NAME>` interface.
    pub fn with_active(self, name: &str, address: &str, rx: u64, tx: u64) -> Self {
        {
            let mut state = self.state();
            let id = state.next_id();
            state.active.push(
                [
                    (".id", id.as_str()),
                    ("name", name),
                    ("service", "pppoe"),
                    ("address", address),
                    ("caller-id", "AA:BB:CC:DD:EE:01"),
                    ("uptime", "1h2m3s"),
                ]
                .into_iter()
                .collect(),
            );
            let id = state.next_id();
            let interface = format!("<pppoe-{name}>");
            let rx = rx.to_string();
            let tx = tx.to_string();
            state.interfaces.push(
                [
                    (".id", id.as_str()),
                    ("name", interface.as_str()),
                    ("rx-byte", rx.as_str()),
                    ("tx-byte", tx.as_str()),
                    ("rx-packet", "10"),
                    ("tx-packet", "20"),
                ]
                .into_iter()
                .collect(),
            );
        }
        self
    }

    /// Marks `name` online without a dynamic interface.
    pub fn with_active_only(self, name: &str) -> Self {
        {
            let mut state = self.state();
            let id = state.next_id();
            state.active.push(
                [(".id", id.as_str()), ("name", name), ("address", "10.10.0.9")]
                    .into_iter()
                    .collect(),
            );
        }
        self
    }

    pub fn refusing_login(self, reason: &str) -> Self {
        self.state().refuse_login = Some(reason.to_string());
        self
    }

    pub fn trapping_on(self, path: &str) -> Self {
        self.state().trap_on = Some(path.to_string());
        self
    }
}

pub fn credential() -> DeviceCredential {
    DeviceCredential::new("10.0.0.1", "admin", "secret")
}

pub struct FakeSession {
    state: Arc<Mutex<RouterState>>,
    device_addr: String,
}

impl FakeSession {
    fn state(&self) -> MutexGuard<'_, RouterState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Connector for FakeRouter {
    type Session = FakeSession;

    async fn connect(&self, credential: &DeviceCredential) -> Result<FakeSession, RouterError> {
        let mut state = self.state();
        if let Some(reason) = &state.refuse_login {
            return Err(RouterError::LoginRejected(reason.clone()));
        }
        state.opened += 1;
        Ok(FakeSession {
            state: self.state.clone(),
            device_addr: credential.device_addr(),
        })
    }
}

fn split_word(word: &str, prefix: char) -> Option<(&str, &str)> {
    word.strip_prefix(prefix)?.split_once('=')
}

fn matches(record: &Record, filters: &[(&str, &str)]) -> bool {
    filters
        .iter()
        .all(|(key, value)| record.get(key).unwrap_or_default() == *value)
}

#[async_trait]
impl Session for FakeSession {
    async fn call(&mut self, path: &str, params: &[String]) -> Result<Vec<Record>, RouterError> {
        let mut state = self.state();
        state.calls.push((path.to_string(), params.to_vec()));
        if state.trap_on.as_deref() == Some(path) {
            return Err(RouterError::Trap("failure: simulated device error".to_string()));
        }

        let Some((menu, verb)) = path.rsplit_once('/') else {
            return Err(RouterError::Trap("no such command".to_string()));
        };
        match (menu, verb) {
            ("/system/identity", "print") => return Ok(vec![state.identity.clone()]),
            ("/system/resource", "print") => return Ok(vec![state.resource.clone()]),
            _ => {}
        }

        let attrs: Vec<(&str, &str)> = params.iter().filter_map(|w| split_word(w, '=')).collect();
        let filters: Vec<(&str, &str)> = params.iter().filter_map(|w| split_word(w, '?')).collect();

        if verb == "add" {
            let id = state.next_id();
            let Some(table) = state.table(menu) else {
                return Err(RouterError::Trap("no such command prefix".to_string()));
            };
            let name = attrs
                .iter()
                .find(|(k, _)| *k == "name")
                .map(|(_, v)| *v)
                .unwrap_or_default();
            if table.iter().any(|r| r.get("name") == Some(name)) {
                return Err(RouterError::Trap("failure: already have such name".to_string()));
            }
            let mut record: Record = [(".id", id.as_str())].into_iter().collect();
            for (key, value) in &attrs {
                record.insert(*key, *value);
            }
            table.push(record);
            return Ok(vec![[("ret", id.as_str())].into_iter().collect()]);
        }

        let Some(table) = state.table(menu) else {
            return Err(RouterError::Trap("no such command prefix".to_string()));
        };
        if verb == "print" {
            return Ok(table
                .iter()
                .filter(|r| matches(r, &filters))
                .cloned()
                .collect());
        }

        let target = attrs
            .iter()
            .find(|(k, _)| *k == ".id")
            .map(|(_, v)| *v)
            .unwrap_or_default();
        let Some(index) = table
            .iter()
            .position(|r| r.get(".id") == Some(target) || r.get("name") == Some(target))
        else {
            return Err(RouterError::Trap("no such item".to_string()));
        };
        match verb {
            "remove" => {
                table.remove(index);
            }
            "set" => {
                for (key, value) in attrs.iter().filter(|(k, _)| *k != ".id") {
                    table[index].insert(*key, *value);
                }
            }
            "enable" => table[index].insert("disabled", "false"),
            "disable" => table[index].insert("disabled", "true"),
            _ => return Err(RouterError::Trap("no such command".to_string())),
        }
        Ok(Vec::new())
    }

    async fn close(&mut self) {
        self.state().closed += 1;
    }

    fn device_addr(&self) -> &str {
        &self.device_addr
    }
}
