//! Name resolution for PPPoE secrets and profiles.
//!
//! Package names in the billing database ("10 Mbps Home") do not always
//! match what is stored on the router: older provisioning slugged names on
//! creation ("10_mbps_home"). Lookups therefore try a fixed candidate list
//! and take the first candidate the device knows.

use log::debug;

use crate::error::RouterError;
use crate::executor::{execute, query};
use crate::session::{Record, Session};

pub const SECRET_PRINT: &str = "/ppp/secret/print";
pub const PROFILE_PRINT: &str = "/ppp/profile/print";
pub const ACTIVE_PRINT: &str = "/ppp/active/print";

/// Lower-case with runs of whitespace replaced by `_`.
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Candidates in lookup order: literal, slug, lower-case.
///
/// Duplicates and empty strings are dropped; order is stable for a given
/// input.
pub fn name_candidates(name: &str) -> Vec<String> {
    let literal = name.trim().to_string();
    let mut candidates: Vec<String> = Vec::with_capacity(3);
    for candidate in [literal.clone(), slugify(&literal), literal.to_lowercase()] {
        if !candidate.is_empty() && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// First record under `print_path` whose `name` matches a candidate.
async fn find_by_name<S>(
    session: &mut S,
    print_path: &str,
    name: &str,
    action: &str,
) -> Result<Option<Record>, RouterError>
where
    S: Session + ?Sized,
{
    for candidate in name_candidates(name) {
        let records = execute(session, print_path, &[query("name", &candidate)])
            .await
            .into_records(action)?;
        if let Some(record) = records.into_iter().next() {
            if candidate != name {
                debug!(
                    "{} resolved '{}' as '{}' in {}",
                    session.device_addr(),
                    name,
                    candidate,
                    print_path
                );
            }
            return Ok(Some(record));
        }
    }
    debug!(
        "{} no match for '{}' in {}",
        session.device_addr(),
        name,
        print_path
    );
    Ok(None)
}

/// Looks up a PPPoE secret by any name candidate.
pub async fn find_secret<S>(session: &mut S, name: &str) -> Result<Option<Record>, RouterError>
where
    S: Session + ?Sized,
{
    find_by_name(session, SECRET_PRINT, name, "membaca PPPoE secret").await
}

/// Looks up a PPPoE profile by any name candidate.
pub async fn find_profile<S>(session: &mut S, name: &str) -> Result<Option<Record>, RouterError>
where
    S: Session + ?Sized,
{
    find_by_name(session, PROFILE_PRINT, name, "membaca profile PPPoE").await
}

/// Looks up the active session of a PPPoE user by any name candidate.
pub async fn find_active<S>(session: &mut S, name: &str) -> Result<Option<Record>, RouterError>
where
    S: Session + ?Sized,
{
    find_by_name(session, ACTIVE_PRINT, name, "membaca sesi PPPoE aktif").await
}

/// Like [`find_secret`], but a miss is a `SecretNotFound` error naming `name`.
pub async fn resolve_secret<S>(session: &mut S, name: &str) -> Result<Record, RouterError>
where
    S: Session + ?Sized,
{
    find_secret(session, name)
        .await?
        .ok_or_else(|| RouterError::SecretNotFound(name.to_string()))
}

/// Like [`find_profile`], but a miss is a `ProfileNotFound` error naming `name`.
pub async fn resolve_profile<S>(session: &mut S, name: &str) -> Result<Record, RouterError>
where
    S: Session + ?Sized,
{
    find_profile(session, name)
        .await?
        .ok_or_else(|| RouterError::ProfileNotFound(name.to_string()))
}
