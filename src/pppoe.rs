//! PPPoE secret and profile lifecycle.
//!
//! Every operation opens its own session through the injected
//! [`Connector`], runs one or more commands and closes the session before
//! returning, on success and on error alike. Nothing is cached between
//! calls.
//!
//! Activation and isolation of a subscriber are both
//! [`PppoeClient::move_to_profile`]: to the paid package profile, or to the
//! isolir profile.

use std::net::Ipv4Addr;

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::credential::DeviceCredential;
use crate::error::RouterError;
use crate::executor::{attr, execute, query};
use crate::legacy::parse::parse_uptime;
use crate::resolve::{
    ACTIVE_PRINT, PROFILE_PRINT, SECRET_PRINT, find_active, find_profile, find_secret,
    resolve_profile, resolve_secret,
};
use crate::session::{Connector, Record, RouterConnector, Session};

fn non_empty(record: &Record, key: &str) -> Option<String> {
    record
        .get(key)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A PPPoE secret stored on the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PppoeSecret {
    /// Internal id (`*1F`); absent when the transport cannot report ids.
    pub id: Option<String>,
    pub name: String,
    pub password: String,
    pub profile: String,
    pub service: String,
    pub comment: Option<String>,
    pub last_logged_out: Option<String>,
    pub local_address: Option<String>,
    pub remote_address: Option<String>,
    pub disabled: bool,
}

impl PppoeSecret {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: non_empty(record, ".id"),
            name: record.get_or_empty("name").to_string(),
            password: record.get_or_empty("password").to_string(),
            profile: record.get_or_empty("profile").to_string(),
            service: record.get_or_empty("service").to_string(),
            comment: non_empty(record, "comment"),
            last_logged_out: non_empty(record, "last-logged-out").filter(|v| v != "never"),
            local_address: non_empty(record, "local-address"),
            remote_address: non_empty(record, "remote-address"),
            disabled: record.get_bool("disabled"),
        }
    }
}

/// A PPP profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PppoeProfile {
    pub id: Option<String>,
    pub name: String,
    pub local_address: Option<String>,
    /// Usually the name of an IP pool.
    pub remote_address: Option<String>,
    /// RouterOS rate limit, e.g. `10M/10M`.
    pub rate_limit: Option<String>,
    pub comment: Option<String>,
}

impl PppoeProfile {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: non_empty(record, ".id"),
            name: record.get_or_empty("name").to_string(),
            local_address: non_empty(record, "local-address"),
            remote_address: non_empty(record, "remote-address"),
            rate_limit: non_empty(record, "rate-limit"),
            comment: non_empty(record, "comment"),
        }
    }
}

/// A connected PPP session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActiveSession {
    pub id: Option<String>,
    pub name: String,
    pub service: String,
    pub address: String,
    pub caller_id: String,
    pub uptime: String,
    pub uptime_secs: u64,
}

impl ActiveSession {
    pub fn from_record(record: &Record) -> Self {
        let uptime = record.get_or_empty("uptime").to_string();
        Self {
            id: non_empty(record, ".id"),
            name: record.get_or_empty("name").to_string(),
            service: record.get_or_empty("service").to_string(),
            address: record.get_or_empty("address").to_string(),
            caller_id: record.get_or_empty("caller-id").to_string(),
            uptime_secs: parse_uptime(&uptime),
            uptime,
        }
    }
}

/// Traffic counters of an online subscriber.
///
/// Counters come from the dynamic `<pppoe-NAME>` interface: `bytes_in` is
/// what the router received from the subscriber, `bytes_out` what it sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActiveStats {
    pub name: String,
    pub address: String,
    pub caller_id: String,
    pub uptime: String,
    pub uptime_secs: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
}

/// Input for [`PppoeClient::create_user`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NewSecret {
    pub name: String,
    pub password: String,
    pub profile: String,
    /// Only sent when it is an IPv4 address or IPv4/CIDR.
    #[serde(default)]
    pub local_address: Option<String>,
    /// Only sent when it is an IPv4 address or IPv4/CIDR.
    #[serde(default)]
    pub remote_address: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Input for [`PppoeClient::create_profile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NewProfile {
    pub name: String,
    /// Address or pool name.
    #[serde(default)]
    pub local_address: Option<String>,
    /// Address or pool name.
    #[serde(default)]
    pub remote_address: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Identity and version of a router, used to test stored credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SystemIdentity {
    pub identity: String,
    pub version: String,
    pub board_name: String,
    pub uptime: String,
}

/// `true` for `a.b.c.d` and `a.b.c.d/n` with `n <= 32`.
///
/// Pool names are not valid `local-address` values on a secret; RouterOS
/// would reject or misapply them, so they are left to the profile.
pub fn is_ipv4_or_cidr(value: &str) -> bool {
    let value = value.trim();
    let (addr, prefix) = match value.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (value, None),
    };
    if addr.parse::<Ipv4Addr>().is_err() {
        return false;
    }
    match prefix {
        None => true,
        Some(p) => p.parse::<u8>().is_ok_and(|p| p <= 32),
    }
}

fn require(field: &str, value: &str) -> Result<(), RouterError> {
    if value.trim().is_empty() {
        return Err(RouterError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Item reference for `set`/`remove`: the internal id, or the name when the
/// transport did not report one.
fn item_id(record: &Record, fallback: &str) -> String {
    record
        .get(".id")
        .or_else(|| record.get("name"))
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Adds a secret on an open session. See [`PppoeClient::create_user`].
pub async fn create_user_on<S>(session: &mut S, user: &NewSecret) -> Result<PppoeSecret, RouterError>
where
    S: Session + ?Sized,
{
    let name = user.name.trim();
    if find_secret(session, name).await?.is_some() {
        return Err(RouterError::DuplicateUser(name.to_string()));
    }
    let profile = resolve_profile(session, &user.profile).await?;
    let profile_name = item_name(&profile, &user.profile);

    let mut params = vec![
        attr("name", name),
        attr("password", &user.password),
        attr("service", "pppoe"),
        attr("profile", &profile_name),
    ];
    let local_address = user
        .local_address
        .as_deref()
        .filter(|a| is_ipv4_or_cidr(a))
        .map(str::to_string);
    if let Some(addr) = &local_address {
        params.push(attr("local-address", addr));
    } else if let Some(skipped) = user.local_address.as_deref().filter(|a| !a.trim().is_empty()) {
        debug!(
            "{} local-address '{}' is not an address, leaving it to profile {}",
            session.device_addr(),
            skipped,
            profile_name
        );
    }
    let remote_address = user
        .remote_address
        .as_deref()
        .filter(|a| is_ipv4_or_cidr(a))
        .map(str::to_string);
    if let Some(addr) = &remote_address {
        params.push(attr("remote-address", addr));
    }
    if let Some(comment) = user.comment.as_deref().filter(|c| !c.is_empty()) {
        params.push(attr("comment", comment));
    }

    let reply = execute(session, "/ppp/secret/add", &params)
        .await
        .into_records("menambahkan PPPoE secret")?;
    debug!("{} added secret {}", session.device_addr(), name);

    Ok(PppoeSecret {
        id: reply
            .first()
            .and_then(|r| r.get("ret"))
            .map(str::to_string),
        name: name.to_string(),
        password: user.password.clone(),
        profile: profile_name,
        service: "pppoe".to_string(),
        comment: user.comment.clone().filter(|c| !c.is_empty()),
        last_logged_out: None,
        local_address,
        remote_address,
        disabled: false,
    })
}

fn item_name(record: &Record, fallback: &str) -> String {
    record
        .get("name")
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Removes a secret on an open session.
pub async fn delete_user_on<S>(session: &mut S, name: &str) -> Result<(), RouterError>
where
    S: Session + ?Sized,
{
    let secret = resolve_secret(session, name).await?;
    let id = item_id(&secret, name);
    execute(session, "/ppp/secret/remove", &[attr(".id", &id)])
        .await
        .into_records("menghapus PPPoE secret")?;
    debug!("{} removed secret {} ({})", session.device_addr(), name, id);
    Ok(())
}

/// Points a secret at another profile on an open session.
pub async fn move_to_profile_on<S>(
    session: &mut S,
    name: &str,
    profile: &str,
) -> Result<PppoeSecret, RouterError>
where
    S: Session + ?Sized,
{
    let secret = resolve_secret(session, name).await?;
    let target = resolve_profile(session, profile).await?;
    let profile_name = item_name(&target, profile);

    execute(
        session,
        "/ppp/secret/set",
        &[attr(".id", item_id(&secret, name)), attr("profile", &profile_name)],
    )
    .await
    .into_records("memindahkan profile PPPoE")?;
    debug!(
        "{} moved secret {} to profile {}",
        session.device_addr(),
        name,
        profile_name
    );

    let mut moved = PppoeSecret::from_record(&secret);
    moved.profile = profile_name;
    Ok(moved)
}

/// Enables or disables a secret on an open session.
pub async fn set_user_enabled_on<S>(session: &mut S, name: &str, enabled: bool) -> Result<(), RouterError>
where
    S: Session + ?Sized,
{
    let secret = resolve_secret(session, name).await?;
    let (path, action) = if enabled {
        ("/ppp/secret/enable", "mengaktifkan PPPoE secret")
    } else {
        ("/ppp/secret/disable", "menonaktifkan PPPoE secret")
    };
    execute(session, path, &[attr(".id", item_id(&secret, name))])
        .await
        .into_records(action)?;
    Ok(())
}

/// Reads live counters on an open session. `None` when the user is offline.
pub async fn active_stats_on<S>(session: &mut S, name: &str) -> Result<Option<ActiveStats>, RouterError>
where
    S: Session + ?Sized,
{
    let Some(active) = find_active(session, name).await? else {
        return Ok(None);
    };
    let active = ActiveSession::from_record(&active);

    let interface = format!("<pppoe-{}>", active.name);
    let counters = execute(session, "/interface/print", &[query("name", &interface)])
        .await
        .into_records("membaca statistik PPPoE")?
        .into_iter()
        .next()
        .unwrap_or_default();

    Ok(Some(ActiveStats {
        name: active.name,
        address: active.address,
        caller_id: active.caller_id,
        uptime: active.uptime,
        uptime_secs: active.uptime_secs,
        bytes_in: counters.get_u64("rx-byte"),
        bytes_out: counters.get_u64("tx-byte"),
        packets_in: counters.get_u64("rx-packet"),
        packets_out: counters.get_u64("tx-packet"),
    }))
}

/// Drops the active session of a user. `false` when the user was offline.
pub async fn disconnect_user_on<S>(session: &mut S, name: &str) -> Result<bool, RouterError>
where
    S: Session + ?Sized,
{
    let Some(active) = find_active(session, name).await? else {
        return Ok(false);
    };
    execute(session, "/ppp/active/remove", &[attr(".id", item_id(&active, name))])
        .await
        .into_records("memutus sesi PPPoE")?;
    debug!("{} disconnected {}", session.device_addr(), name);
    Ok(true)
}

/// Adds a profile on an open session.
pub async fn create_profile_on<S>(session: &mut S, profile: &NewProfile) -> Result<PppoeProfile, RouterError>
where
    S: Session + ?Sized,
{
    if find_profile(session, &profile.name).await?.is_some() {
        return Err(RouterError::DuplicateProfile(profile.name.clone()));
    }
    let optional = |v: &Option<String>| v.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
    let local_address = optional(&profile.local_address);
    let remote_address = optional(&profile.remote_address);
    let rate_limit = optional(&profile.rate_limit);
    let comment = optional(&profile.comment);

    let mut params = vec![attr("name", &profile.name)];
    for (key, value) in [
        ("local-address", &local_address),
        ("remote-address", &remote_address),
        ("rate-limit", &rate_limit),
        ("comment", &comment),
    ] {
        if let Some(value) = value {
            params.push(attr(key, value));
        }
    }

    let reply = execute(session, "/ppp/profile/add", &params)
        .await
        .into_records("menambahkan profile PPPoE")?;
    Ok(PppoeProfile {
        id: reply.first().and_then(|r| r.get("ret")).map(str::to_string),
        name: profile.name.clone(),
        local_address,
        remote_address,
        rate_limit,
        comment,
    })
}

/// Removes a profile on an open session.
pub async fn delete_profile_on<S>(session: &mut S, name: &str) -> Result<(), RouterError>
where
    S: Session + ?Sized,
{
    let profile = resolve_profile(session, name).await?;
    execute(session, "/ppp/profile/remove", &[attr(".id", item_id(&profile, name))])
        .await
        .into_records("menghapus profile PPPoE")?;
    Ok(())
}

/// Provisioning client.
///
/// The connector is injected so the same operations run over the API, the
/// SSH console, or a scripted device in tests.
#[derive(Debug, Clone, Default)]
pub struct PppoeClient<C = RouterConnector> {
    connector: C,
}

impl<C: Connector> PppoeClient<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    async fn open(&self, credential: &DeviceCredential) -> Result<C::Session, RouterError> {
        self.connector
            .connect(credential)
            .await
            .map_err(RouterError::connect)
    }

    /// Creates a secret.
    ///
    /// Fails with [`RouterError::DuplicateUser`] before adding anything when
    /// any name candidate already exists, and with
    /// [`RouterError::ProfileNotFound`] when the package profile is unknown.
    pub async fn create_user(
        &self,
        credential: &DeviceCredential,
        user: &NewSecret,
    ) -> Result<PppoeSecret, RouterError> {
        require("name", &user.name)?;
        require("password", &user.password)?;
        require("profile", &user.profile)?;
        let mut session = self.open(credential).await?;
        let result = create_user_on(&mut session, user).await;
        session.close().await;
        result
    }

    /// Deletes a secret, failing with [`RouterError::SecretNotFound`] when absent.
    pub async fn delete_user(&self, credential: &DeviceCredential, name: &str) -> Result<(), RouterError> {
        require("name", name)?;
        let mut session = self.open(credential).await?;
        let result = delete_user_on(&mut session, name).await;
        session.close().await;
        result
    }

    /// Moves a secret to `profile`.
    ///
    /// Secret and profile are resolved independently; a missing secret and
    /// a missing profile fail with different errors.
    pub async fn move_to_profile(
        &self,
        credential: &DeviceCredential,
        name: &str,
        profile: &str,
    ) -> Result<PppoeSecret, RouterError> {
        require("name", name)?;
        require("profile", profile)?;
        let mut session = self.open(credential).await?;
        let result = move_to_profile_on(&mut session, name, profile).await;
        session.close().await;
        result
    }

    pub async fn get_user(
        &self,
        credential: &DeviceCredential,
        name: &str,
    ) -> Result<Option<PppoeSecret>, RouterError> {
        require("name", name)?;
        let mut session = self.open(credential).await?;
        let result = find_secret(&mut session, name).await;
        session.close().await;
        Ok(result?.as_ref().map(PppoeSecret::from_record))
    }

    /// Live counters, or `None` when the user has no active session.
    pub async fn get_active_stats(
        &self,
        credential: &DeviceCredential,
        name: &str,
    ) -> Result<Option<ActiveStats>, RouterError> {
        require("name", name)?;
        let mut session = self.open(credential).await?;
        let result = active_stats_on(&mut session, name).await;
        session.close().await;
        result
    }

    pub async fn set_user_enabled(
        &self,
        credential: &DeviceCredential,
        name: &str,
        enabled: bool,
    ) -> Result<(), RouterError> {
        require("name", name)?;
        let mut session = self.open(credential).await?;
        let result = set_user_enabled_on(&mut session, name, enabled).await;
        session.close().await;
        result
    }

    /// Kicks the user's active session so a profile change applies on reconnect.
    pub async fn disconnect_user(&self, credential: &DeviceCredential, name: &str) -> Result<bool, RouterError> {
        require("name", name)?;
        let mut session = self.open(credential).await?;
        let result = disconnect_user_on(&mut session, name).await;
        session.close().await;
        result
    }

    pub async fn list_secrets(&self, credential: &DeviceCredential) -> Result<Vec<PppoeSecret>, RouterError> {
        self.list(credential, SECRET_PRINT, "membaca PPPoE secret", PppoeSecret::from_record)
            .await
    }

    pub async fn list_profiles(&self, credential: &DeviceCredential) -> Result<Vec<PppoeProfile>, RouterError> {
        self.list(credential, PROFILE_PRINT, "membaca profile PPPoE", PppoeProfile::from_record)
            .await
    }

    pub async fn list_active(&self, credential: &DeviceCredential) -> Result<Vec<ActiveSession>, RouterError> {
        self.list(credential, ACTIVE_PRINT, "membaca sesi PPPoE aktif", ActiveSession::from_record)
            .await
    }

    async fn list<T>(
        &self,
        credential: &DeviceCredential,
        path: &str,
        action: &str,
        map: fn(&Record) -> T,
    ) -> Result<Vec<T>, RouterError> {
        let mut session = self.open(credential).await?;
        let result = execute(&mut session, path, &[]).await;
        session.close().await;
        Ok(result.into_records(action)?.iter().map(map).collect())
    }

    pub async fn create_profile(
        &self,
        credential: &DeviceCredential,
        profile: &NewProfile,
    ) -> Result<PppoeProfile, RouterError> {
        require("name", &profile.name)?;
        let mut session = self.open(credential).await?;
        let result = create_profile_on(&mut session, profile).await;
        session.close().await;
        result
    }

    pub async fn delete_profile(&self, credential: &DeviceCredential, name: &str) -> Result<(), RouterError> {
        require("name", name)?;
        let mut session = self.open(credential).await?;
        let result = delete_profile_on(&mut session, name).await;
        session.close().await;
        result
    }

    /// Logs in and reads identity and version.
    pub async fn test_connection(&self, credential: &DeviceCredential) -> Result<SystemIdentity, RouterError> {
        let mut session = self.open(credential).await?;
        let result = system_identity_on(&mut session).await;
        session.close().await;
        result
    }
}

/// Reads identity and resource information on an open session.
pub async fn system_identity_on<S>(session: &mut S) -> Result<SystemIdentity, RouterError>
where
    S: Session + ?Sized,
{
    let identity = execute(session, "/system/identity/print", &[])
        .await
        .into_records("membaca identitas router")?
        .into_iter()
        .next()
        .unwrap_or_default();
    let resource = execute(session, "/system/resource/print", &[])
        .await
        .into_records("membaca resource router")?
        .into_iter()
        .next()
        .unwrap_or_default();
    Ok(SystemIdentity {
        identity: identity.get_or_empty("name").to_string(),
        version: resource.get_or_empty("version").to_string(),
        board_name: resource.get_or_empty("board-name").to_string(),
        uptime: resource.get_or_empty("uptime").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_address_accepts_only_ipv4_literals() {
        assert!(is_ipv4_or_cidr("10.0.0.1"));
        assert!(is_ipv4_or_cidr("10.0.0.0/24"));
        assert!(is_ipv4_or_cidr(" 192.168.1.1/32 "));
        assert!(!is_ipv4_or_cidr("10.0.0.0/33"));
        assert!(!is_ipv4_or_cidr("pool-pppoe"));
        assert!(!is_ipv4_or_cidr("10.0.0"));
        assert!(!is_ipv4_or_cidr(""));
    }

    #[test]
    fn item_id_prefers_internal_id() {
        let with_id: Record = [(".id", "*1F"), ("name", "john01")].into_iter().collect();
        assert_eq!(item_id(&with_id, "john01"), "*1F");

        let without_id: Record = [("name", "john_01")].into_iter().collect();
        assert_eq!(item_id(&without_id, "John 01"), "john_01");

        assert_eq!(item_id(&Record::new(), "John 01"), "John 01");
    }

    #[test]
    fn secret_from_record_maps_device_fields() {
        let record: Record = [
            (".id", "*2"),
            ("name", "john01"),
            ("password", "pw"),
            ("profile", "paket_a"),
            ("service", "pppoe"),
            ("last-logged-out", "never"),
            ("disabled", "false"),
        ]
        .into_iter()
        .collect();
        let secret = PppoeSecret::from_record(&record);
        assert_eq!(secret.id.as_deref(), Some("*2"));
        assert_eq!(secret.profile, "paket_a");
        assert_eq!(secret.last_logged_out, None);
        assert!(!secret.disabled);
    }
}
