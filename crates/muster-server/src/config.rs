//! Runtime server configuration, deserialised from `muster.toml` and
//! `MUSTER__*` environment variables.
//!
//! ```toml
//! host       = "0.0.0.0"
//! port       = 8080
//! store_path = "~/.local/share/muster/incidents.db"
//!
//! [pins]
//! supervisor = "$argon2id$v=19$…"
//!
//! [pins.sub_regions]
//! Daura       = "$argon2id$v=19$…"
//! "Dutsin-Ma" = "$argon2id$v=19$…"
//!
//! [summarizer]
//! api_key = "…"
//! ```

use std::{collections::HashMap, path::PathBuf, str::FromStr, time::Duration};

use argon2::PasswordHash;
use muster_api::PinTable;
use muster_core::roster::SubRegion;
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  /// SQLite file; `:memory:` keeps everything in memory.
  #[serde(default = "default_store_path")]
  pub store_path:       PathBuf,
  /// How often live views check for commits by other processes.
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
  #[serde(default)]
  pub pins:             PinConfig,
  pub summarizer:       Option<SummarizerConfig>,
}

/// argon2 PHC hashes of the shared PINs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PinConfig {
  pub supervisor:  Option<String>,
  /// Keyed by sub-region label.
  #[serde(default)]
  pub sub_regions: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizerConfig {
  #[serde(default = "default_endpoint")]
  pub endpoint:     String,
  #[serde(default = "default_model")]
  pub model:        String,
  /// Sent as the `x-goog-api-key` header.
  pub api_key:      String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("muster.db") }

fn default_poll_interval_ms() -> u64 { 500 }

fn default_endpoint() -> String { "https://generativelanguage.googleapis.com/v1beta".into() }

fn default_model() -> String { "gemini-1.5-flash".into() }

fn default_timeout_secs() -> u64 { 60 }

impl ServerConfig {
  pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms.max(10)) }

  pub fn in_memory(&self) -> bool { self.store_path.as_os_str() == ":memory:" }

  /// Validate the configured PINs and build the lookup table.
  pub fn pin_table(&self) -> Result<PinTable, Error> {
    let mut table = PinTable::new();
    if let Some(hash) = &self.pins.supervisor {
      check_hash("supervisor", hash)?;
      table = table.with_supervisor(hash.clone());
    }
    for (name, hash) in &self.pins.sub_regions {
      let region =
        SubRegion::from_str(name).map_err(|_| Error::UnknownSubRegion(name.clone()))?;
      check_hash(name, hash)?;
      table = table.with_officer(region, hash.clone());
    }
    if table.is_empty() {
      return Err(Error::NoPins);
    }
    Ok(table)
  }
}

fn check_hash(user: &str, hash: &str) -> Result<(), Error> {
  PasswordHash::new(hash).map_err(|e| Error::InvalidPinHash {
    user:   user.to_owned(),
    reason: e.to_string(),
  })?;
  Ok(())
}
