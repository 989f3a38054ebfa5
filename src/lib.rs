//! # rosnet - MikroTik RouterOS PPPoE provisioning
//!
//! `rosnet` manages PPPoE subscribers on MikroTik routers for an ISP billing
//! backend. Each operation opens a fresh authenticated session, runs its
//! commands, and closes the session before returning.
//!
//! ## Features
//!
//! - **Two Transports**: binary RouterOS API (TCP 8728) or the RouterOS console over SSH
//! - **Lifecycle Operations**: create, delete, enable, isolate and move PPPoE secrets between profiles
//! - **Name Resolution**: finds secrets and profiles stored under slugged or lower-cased names
//! - **Legacy Monitoring**: bandwidth, pools and system resources parsed from console output
//! - **Typed Errors**: every failure has a kind and a user-facing message
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rosnet::credential::DeviceCredential;
//! use rosnet::pppoe::{NewSecret, PppoeClient};
//! use rosnet::session::RouterConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = DeviceCredential::new("192.168.88.1", "admin", "secret");
//!     let client = PppoeClient::new(RouterConnector::new());
//!
//!     let secret = client
//!         .create_user(
//!             &router,
//!             &NewSecret {
//!                 name: "john01".to_string(),
//!                 password: "pw".to_string(),
//!                 profile: "Paket 10Mbps".to_string(),
//!                 ..Default::default()
//!             },
//!         )
//!         .await?;
//!     println!("created {} on profile {}", secret.name, secret.profile);
//!
//!     // Unpaid invoice: isolate the subscriber.
//!     client.move_to_profile(&router, "john01", "isolir").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`pppoe::PppoeClient`] - PPPoE secret and profile lifecycle
//! - [`session::RouterConnector`] - Chooses API or SSH from the credential
//! - [`legacy::LegacyMonitor`] - Read-only console polling
//! - [`error::RouterError`] - Error type with a [`error::ErrorKind`] per failure
//! - [`config`] - Ports, timeouts and SSH algorithm lists

pub mod config;
pub mod credential;
pub mod error;
pub mod executor;
pub mod legacy;
pub mod pppoe;
pub mod resolve;
pub mod session;
