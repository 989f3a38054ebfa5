//! SSH console path for read-only monitoring.
//!
//! Bandwidth, pools, system resources and secret status are read by running
//! console commands and parsing their text output. Each query is an ordered
//! list of command variants with a parser per variant ([`monitor::Attempt`]);
//! the first variant that produces a recognisable result wins, which keeps
//! the queries working across RouterOS 6.x and 7.x output formats.

pub mod monitor;
pub mod parse;

pub use monitor::{
    Attempt, LegacyMonitor, SecretStatus, bandwidth, list_pools, run_chain, secrets_status,
    system_info,
};
pub use parse::{Bandwidth, ConsoleSecret, IpPool, SystemInfo};
