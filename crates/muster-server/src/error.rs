//! Error type for server setup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no PINs configured; set pins.supervisor or pins.sub_regions")]
  NoPins,

  #[error("unknown sub-region in pins.sub_regions: {0:?}")]
  UnknownSubRegion(String),

  #[error("PIN hash for {user} is not a valid PHC string: {reason}")]
  InvalidPinHash { user: String, reason: String },

  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),
}
