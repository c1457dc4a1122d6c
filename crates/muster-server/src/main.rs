//! muster-server binary.
//!
//! Reads `muster.toml` (or the path given with `--config`), opens the SQLite
//! incident store and serves the JSON API over HTTP.
//!
//! # PIN hash generation
//!
//! To generate the argon2 PHC strings for the `[pins]` table:
//!
//! ```
//! cargo run -p muster-server -- --hash-pin
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use muster_server::config::ServerConfig;
use muster_store_sqlite::{StoreHandle, StoreLocation};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Muster incident server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "muster.toml", env = "MUSTER_CONFIG")]
  config: PathBuf,

  /// Print the argon2 hash for a PIN entered on stdin and exit.
  #[arg(long)]
  hash_pin: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_pin {
    let pin = read_pin()?;
    let hash = muster_api::auth::hash_pin(&pin).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("MUSTER").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let location = if server_cfg.in_memory() {
    StoreLocation::Memory
  } else {
    StoreLocation::File(expand_tilde(&server_cfg.store_path))
  };
  let handle = StoreHandle::new(location);
  let store = handle
    .get_or_open()
    .await
    .with_context(|| format!("failed to open store at {:?}", handle.location()))?
    .clone();

  let state = muster_server::build_state(&server_cfg, store).context("invalid configuration")?;
  let app = muster_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a PIN from stdin.
fn read_pin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("PIN: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let pin = line.trim_end_matches(['\n', '\r']).to_owned();
  anyhow::ensure!(!pin.is_empty(), "PIN must not be empty");
  Ok(pin)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
