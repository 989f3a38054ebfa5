mod common;

use common::{FakeRouter, credential};
use rosnet::error::{ErrorKind, RouterError};
use rosnet::pppoe::{NewProfile, NewSecret, PppoeClient};

fn new_secret(name: &str, profile: &str) -> NewSecret {
    NewSecret {
        name: name.to_string(),
        password: "pw123".to_string(),
        profile: profile.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn create_user_resolves_package_profile_and_returns_id() {
    let router = FakeRouter::new().with_profile("paket_a");
    let client = PppoeClient::new(router.clone());

    let mut user = new_secret("john01", "Paket A");
    user.comment = Some("INV-2024-001".to_string());
    let secret = client
        .create_user(&credential(), &user)
        .await
        .expect("create user");

    assert_eq!(secret.name, "john01");
    assert_eq!(secret.profile, "paket_a");
    assert_eq!(secret.service, "pppoe");

    let state = router.state();
    let stored = state.secret("john01").expect("secret stored");
    assert_eq!(stored.get("profile"), Some("paket_a"));
    assert_eq!(stored.get("service"), Some("pppoe"));
    assert_eq!(stored.get("comment"), Some("INV-2024-001"));
    assert_eq!(secret.id.as_deref(), stored.get(".id"));
    assert_eq!(state.opened, 1);
    assert_eq!(state.closed, 1);
}

#[tokio::test]
async fn create_user_rejects_slug_collision_before_adding() {
    let router = FakeRouter::new()
        .with_profile("paket_a")
        .with_secret("paket_a", "paket_a");
    let client = PppoeClient::new(router.clone());

    let err = client
        .create_user(&credential(), &new_secret("Paket A", "paket_a"))
        .await
        .expect_err("duplicate must fail");

    assert!(matches!(err, RouterError::DuplicateUser(ref name) if name == "Paket A"));
    assert_eq!(err.kind(), ErrorKind::DuplicateUser);
    assert!(err.to_string().contains("sudah digunakan"));

    let state = router.state();
    assert_eq!(state.count("/ppp/secret/add"), 0);
    assert_eq!(state.closed, 1);
}

#[tokio::test]
async fn create_user_stores_trimmed_name() {
    let router = FakeRouter::new().with_profile("paket_a");
    let client = PppoeClient::new(router.clone());

    let secret = client
        .create_user(&credential(), &new_secret("  john01 ", "paket_a"))
        .await
        .expect("create user");
    assert_eq!(secret.name, "john01");

    let state = router.state();
    assert!(state.secret("john01").is_some());
    assert!(state.secret("  john01 ").is_none());
    drop(state);

    let found = client
        .get_user(&credential(), "john01")
        .await
        .expect("lookup");
    assert!(found.is_some());
}

#[tokio::test]
async fn create_user_fails_on_unknown_profile_without_adding() {
    let router = FakeRouter::new().with_profile("paket_a");
    let client = PppoeClient::new(router.clone());

    let err = client
        .create_user(&credential(), &new_secret("john01", "Paket Z"))
        .await
        .expect_err("unknown profile");

    assert_eq!(err.kind(), ErrorKind::ProfileNotFound);
    assert!(err.to_string().contains("Paket Z"));
    assert_eq!(router.state().count("/ppp/secret/add"), 0);
}

#[tokio::test]
async fn create_user_sends_only_ipv4_local_address() {
    let router = FakeRouter::new().with_profile("paket_a");
    let client = PppoeClient::new(router.clone());

    let mut with_pool = new_secret("pool01", "paket_a");
    with_pool.local_address = Some("pool-pppoe".to_string());
    with_pool.remote_address = Some("10.10.0.0/24".to_string());
    let secret = client
        .create_user(&credential(), &with_pool)
        .await
        .expect("create with pool name");
    assert_eq!(secret.local_address, None);
    assert_eq!(secret.remote_address.as_deref(), Some("10.10.0.0/24"));

    let mut with_ip = new_secret("ip01", "paket_a");
    with_ip.local_address = Some("10.10.0.1".to_string());
    client
        .create_user(&credential(), &with_ip)
        .await
        .expect("create with address");

    let state = router.state();
    let pool = state.secret("pool01").expect("pool01 stored");
    assert_eq!(pool.get("local-address"), None);
    assert_eq!(pool.get("remote-address"), Some("10.10.0.0/24"));
    let ip = state.secret("ip01").expect("ip01 stored");
    assert_eq!(ip.get("local-address"), Some("10.10.0.1"));
}

#[tokio::test]
async fn create_user_validates_input_before_connecting() {
    let router = FakeRouter::new();
    let client = PppoeClient::new(router.clone());

    let err = client
        .create_user(&credential(), &new_secret("  ", "paket_a"))
        .await
        .expect_err("empty name");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(router.state().opened, 0);
}

#[tokio::test]
async fn device_trap_is_reported_with_action_and_session_still_closed() {
    let router = FakeRouter::new()
        .with_profile("paket_a")
        .trapping_on("/ppp/secret/add");
    let client = PppoeClient::new(router.clone());

    let err = client
        .create_user(&credential(), &new_secret("john01", "paket_a"))
        .await
        .expect_err("trap");

    assert_eq!(err.kind(), ErrorKind::Command);
    assert_eq!(
        err.to_string(),
        "Gagal menambahkan PPPoE secret: failure: simulated device error"
    );
    let state = router.state();
    assert_eq!(state.opened, 1);
    assert_eq!(state.closed, 1);
}

#[tokio::test]
async fn connect_failure_carries_prefix_and_opens_nothing() {
    let router = FakeRouter::new().refusing_login("invalid user name or password (6)");
    let client = PppoeClient::new(router.clone());

    let err = client
        .get_user(&credential(), "john01")
        .await
        .expect_err("login refused");

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().starts_with("Gagal terhubung ke MikroTik: "));
    assert!(err.to_string().contains("invalid user name or password"));
    let state = router.state();
    assert_eq!(state.opened, 0);
    assert_eq!(state.closed, 0);
}

#[tokio::test]
async fn delete_user_resolves_slugged_name() {
    let router = FakeRouter::new().with_secret("john_doe", "paket_a");
    let client = PppoeClient::new(router.clone());

    client
        .delete_user(&credential(), "John Doe")
        .await
        .expect("delete");

    let state = router.state();
    assert!(state.secret("john_doe").is_none());
    assert_eq!(state.count("/ppp/secret/remove"), 1);
    assert_eq!(state.closed, 1);
}

#[tokio::test]
async fn delete_missing_user_is_secret_not_found() {
    let router = FakeRouter::new();
    let client = PppoeClient::new(router.clone());

    let err = client
        .delete_user(&credential(), "ghost")
        .await
        .expect_err("missing");

    assert_eq!(err.kind(), ErrorKind::SecretNotFound);
    assert_eq!(
        err.to_string(),
        "PPPoE secret \"ghost\" tidak ditemukan di MikroTik"
    );
    assert_eq!(router.state().count("/ppp/secret/remove"), 0);
    assert_eq!(router.state().closed, 1);
}

#[tokio::test]
async fn move_to_profile_resolves_profile_candidates() {
    let router = FakeRouter::new()
        .with_profile("paket_a")
        .with_profile("premium_20mbps")
        .with_secret("john01", "paket_a");
    let client = PppoeClient::new(router.clone());

    let moved = client
        .move_to_profile(&credential(), "john01", "Premium 20Mbps")
        .await
        .expect("move");

    assert_eq!(moved.profile, "premium_20mbps");
    let state = router.state();
    assert_eq!(state.count("/ppp/secret/set"), 1);
    assert_eq!(
        state.secret("john01").and_then(|s| s.get("profile")),
        Some("premium_20mbps")
    );
    assert_eq!(state.closed, 1);
}

#[tokio::test]
async fn move_to_profile_distinguishes_missing_profile_from_missing_secret() {
    let router = FakeRouter::new()
        .with_profile("isolir")
        .with_secret("john01", "paket_a");
    let client = PppoeClient::new(router.clone());

    let missing_profile = client
        .move_to_profile(&credential(), "john01", "Premium 20Mbps")
        .await
        .expect_err("profile missing");
    assert_eq!(missing_profile.kind(), ErrorKind::ProfileNotFound);
    assert!(missing_profile.to_string().contains("Premium 20Mbps"));

    let missing_secret = client
        .move_to_profile(&credential(), "ghost", "isolir")
        .await
        .expect_err("secret missing");
    assert_eq!(missing_secret.kind(), ErrorKind::SecretNotFound);

    let state = router.state();
    assert_eq!(state.count("/ppp/secret/set"), 0);
    assert_eq!(state.opened, 2);
    assert_eq!(state.closed, 2);
}

#[tokio::test]
async fn isolation_round_trip_through_profiles() {
    let router = FakeRouter::new()
        .with_profile("paket_a")
        .with_profile("isolir")
        .with_secret("john01", "paket_a");
    let client = PppoeClient::new(router.clone());
    let cred = credential();

    client
        .move_to_profile(&cred, "john01", "isolir")
        .await
        .expect("isolate");
    let isolated = client.get_user(&cred, "john01").await.expect("get");
    assert_eq!(isolated.map(|s| s.profile).as_deref(), Some("isolir"));

    client
        .move_to_profile(&cred, "john01", "Paket A")
        .await
        .expect("reactivate");
    let active = client.get_user(&cred, "john01").await.expect("get");
    assert_eq!(active.map(|s| s.profile).as_deref(), Some("paket_a"));
}

#[tokio::test]
async fn get_user_returns_none_when_absent() {
    let router = FakeRouter::new().with_secret("john01", "paket_a");
    let client = PppoeClient::new(router.clone());

    assert!(client
        .get_user(&credential(), "ghost")
        .await
        .expect("lookup")
        .is_none());
    let found = client
        .get_user(&credential(), "john01")
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(found.profile, "paket_a");
    assert!(!found.disabled);
    assert_eq!(router.state().closed, 2);
}

#[tokio::test]
async fn active_stats_are_none_for_offline_user() {
    let router = FakeRouter::new().with_secret("john01", "paket_a");
    let client = PppoeClient::new(router.clone());

    let stats = client
        .get_active_stats(&credential(), "john01")
        .await
        .expect("stats");
    assert!(stats.is_none());
    assert_eq!(router.state().count("/interface/print"), 0);
}

#[tokio::test]
async fn active_stats_read_interface_counters() {
    let router = FakeRouter::new()
        .with_secret("john01", "paket_a")
        .with_active("john01", "10.10.0.5", 1_048_576, 524_288);
    let client = PppoeClient::new(router.clone());

    let stats = client
        .get_active_stats(&credential(), "john01")
        .await
        .expect("stats")
        .expect("online");

    assert_eq!(stats.address, "10.10.0.5");
    assert_eq!(stats.bytes_in, 1_048_576);
    assert_eq!(stats.bytes_out, 524_288);
    assert_eq!(stats.uptime, "1h2m3s");
    assert_eq!(stats.uptime_secs, 3723);
    assert_eq!(router.state().closed, 1);
}

#[tokio::test]
async fn active_stats_without_interface_read_as_zero() {
    let router = FakeRouter::new().with_active_only("john01");
    let client = PppoeClient::new(router);

    let stats = client
        .get_active_stats(&credential(), "john01")
        .await
        .expect("stats")
        .expect("online");
    assert_eq!(stats.bytes_in, 0);
    assert_eq!(stats.bytes_out, 0);
}

#[tokio::test]
async fn set_user_enabled_toggles_disabled_flag() {
    let router = FakeRouter::new().with_secret("john01", "paket_a");
    let client = PppoeClient::new(router.clone());

    client
        .set_user_enabled(&credential(), "john01", false)
        .await
        .expect("disable");
    assert_eq!(
        router.state().secret("john01").and_then(|s| s.get("disabled")),
        Some("true")
    );

    client
        .set_user_enabled(&credential(), "john01", true)
        .await
        .expect("enable");
    assert_eq!(
        router.state().secret("john01").and_then(|s| s.get("disabled")),
        Some("false")
    );
}

#[tokio::test]
async fn disconnect_user_removes_active_session() {
    let router = FakeRouter::new().with_active("john01", "10.10.0.5", 0, 0);
    let client = PppoeClient::new(router.clone());

    assert!(!client
        .disconnect_user(&credential(), "ghost")
        .await
        .expect("offline user"));
    assert!(client
        .disconnect_user(&credential(), "john01")
        .await
        .expect("online user"));
    assert!(router.state().active.is_empty());
}

#[tokio::test]
async fn profiles_can_be_created_listed_and_deleted() {
    let router = FakeRouter::new().with_profile("isolir");
    let client = PppoeClient::new(router.clone());
    let cred = credential();

    let created = client
        .create_profile(
            &cred,
            &NewProfile {
                name: "paket_10mbps".to_string(),
                remote_address: Some("pool-pppoe".to_string()),
                rate_limit: Some("10M/10M".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("create profile");
    assert!(created.id.is_some());
    assert_eq!(created.rate_limit.as_deref(), Some("10M/10M"));

    let duplicate = client
        .create_profile(
            &cred,
            &NewProfile {
                name: "Isolir".to_string(),
                ..Default::default()
            },
        )
        .await
        .expect_err("duplicate profile");
    assert_eq!(duplicate.kind(), ErrorKind::DuplicateProfile);

    let names: Vec<String> = client
        .list_profiles(&cred)
        .await
        .expect("list")
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["isolir", "paket_10mbps"]);

    client
        .delete_profile(&cred, "Paket 10Mbps")
        .await
        .expect("delete profile");
    assert_eq!(router.state().profiles.len(), 1);

    let missing = client
        .delete_profile(&cred, "Paket 10Mbps")
        .await
        .expect_err("already deleted");
    assert_eq!(missing.kind(), ErrorKind::ProfileNotFound);
}

#[tokio::test]
async fn listings_map_device_rows() {
    let router = FakeRouter::new()
        .with_secret("john01", "paket_a")
        .with_secret("jane02", "isolir")
        .with_active("john01", "10.10.0.5", 0, 0);
    let client = PppoeClient::new(router.clone());
    let cred = credential();

    let secrets = client.list_secrets(&cred).await.expect("secrets");
    assert_eq!(secrets.len(), 2);
    assert_eq!(secrets[1].profile, "isolir");

    let active = client.list_active(&cred).await.expect("active");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].caller_id, "AA:BB:CC:DD:EE:01");

    let state = router.state();
    assert_eq!(state.opened, 2);
    assert_eq!(state.closed, 2);
}

#[tokio::test]
async fn test_connection_reports_identity() {
    let router = FakeRouter::new();
    let client = PppoeClient::new(router.clone());

    let identity = client
        .test_connection(&credential())
        .await
        .expect("identity");
    assert_eq!(identity.identity, "core-router");
    assert_eq!(identity.version, "7.14.3 (stable)");
    assert_eq!(
        router.state().paths(),
        vec!["/system/identity/print", "/system/resource/print"]
    );
}
