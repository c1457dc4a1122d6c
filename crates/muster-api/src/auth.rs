//! Shared-PIN authorization over HTTP Basic auth.
//!
//! The username names the role: `supervisor`, or a sub-region for that
//! sub-region's officer. The password is the PIN, checked against an argon2
//! PHC hash from configuration.

use std::{collections::HashMap, str::FromStr};

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use muster_core::{access::Principal, roster::SubRegion, store::IncidentStore};
use rand_core::OsRng;

use crate::{AppState, error::ApiError};

/// The username that selects the supervisor PIN.
pub const SUPERVISOR_USER: &str = "supervisor";

/// PIN hashes per role. A role without a hash cannot log in.
#[derive(Debug, Clone, Default)]
pub struct PinTable {
  supervisor: Option<String>,
  officers:   HashMap<SubRegion, String>,
}

impl PinTable {
  pub fn new() -> Self { Self::default() }

  pub fn with_supervisor(mut self, hash: impl Into<String>) -> Self {
    self.supervisor = Some(hash.into());
    self
  }

  pub fn with_officer(mut self, region: SubRegion, hash: impl Into<String>) -> Self {
    self.officers.insert(region, hash.into());
    self
  }

  pub fn is_empty(&self) -> bool { self.supervisor.is_none() && self.officers.is_empty() }

  /// Resolve `username` to the principal it would log in as, and the hash
  /// its PIN must match.
  fn lookup(&self, username: &str) -> Option<(Principal, &str)> {
    if username.eq_ignore_ascii_case(SUPERVISOR_USER) {
      return Some((Principal::supervisor(), self.supervisor.as_deref()?));
    }
    let region = SubRegion::from_str(username).ok()?;
    let hash = self.officers.get(&region)?;
    Some((Principal::officer(region), hash))
  }

  /// Check a username and PIN.
  pub fn verify(&self, username: &str, pin: &str) -> Result<Principal, ApiError> {
    let (principal, hash) = self.lookup(username).ok_or(ApiError::Unauthorized)?;
    let parsed = PasswordHash::new(hash).map_err(|_| ApiError::Unauthorized)?;
    Argon2::default()
      .verify_password(pin.as_bytes(), &parsed)
      .map_err(|_| ApiError::Unauthorized)?;
    Ok(principal)
  }
}

/// Produce the argon2 PHC string for `pin`, as stored in configuration.
pub fn hash_pin(pin: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(pin.as_bytes(), &salt)?.to_string())
}

/// Verify Basic credentials directly from headers.
pub fn verify_auth(headers: &HeaderMap, pins: &PinTable) -> Result<Principal, ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, pin) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let principal = pins.verify(username, pin);
  if principal.is_err() {
    tracing::debug!(username, "rejected credentials");
  }
  principal
}

/// Present in a handler means the request carried valid credentials.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Principal);

impl Authenticated {
  pub fn require_supervisor(&self) -> Result<(), ApiError> {
    if self.0.is_supervisor() {
      Ok(())
    } else {
      Err(ApiError::Forbidden("supervisor access required".into()))
    }
  }
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: IncidentStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, &state.pins).map(Authenticated)
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn basic(user: &str, pin: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let value = format!("Basic {}", B64.encode(format!("{user}:{pin}")));
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
    headers
  }

  fn pins() -> PinTable {
    PinTable::new()
      .with_supervisor(hash_pin("0000").unwrap())
      .with_officer(SubRegion::DutsinMa, hash_pin("1234").unwrap())
  }

  #[test]
  fn supervisor_pin() {
    let principal = verify_auth(&basic("supervisor", "0000"), &pins()).unwrap();
    assert!(principal.is_supervisor());
  }

  #[test]
  fn officer_pin_binds_sub_region() {
    let principal = verify_auth(&basic("dutsin-ma", "1234"), &pins()).unwrap();
    assert_eq!(principal, Principal::officer(SubRegion::DutsinMa));
  }

  #[test]
  fn wrong_pin_or_unknown_role() {
    let pins = pins();
    assert!(matches!(
      verify_auth(&basic("supervisor", "1234"), &pins),
      Err(ApiError::Unauthorized)
    ));
    // Daura has no PIN configured.
    assert!(matches!(
      verify_auth(&basic("Daura", "1234"), &pins),
      Err(ApiError::Unauthorized)
    ));
    assert!(matches!(
      verify_auth(&basic("Lagos", "1234"), &pins),
      Err(ApiError::Unauthorized)
    ));
  }

  #[test]
  fn missing_or_garbled_header() {
    assert!(matches!(
      verify_auth(&HeaderMap::new(), &pins()),
      Err(ApiError::Unauthorized)
    ));
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!"));
    assert!(matches!(verify_auth(&headers, &pins()), Err(ApiError::Unauthorized)));
  }
}
