//! `muster`: command-line client for the muster incident server.
//!
//! # Usage
//!
//! ```
//! muster --url http://localhost:8080 --user supervisor --pin 0000 list
//! muster --config ~/.config/muster/config.toml stats
//! muster add --name "Amina Bello" --state-code KT/24A/0001 --sub-region Daura \
//!   --category Missing --date-of-incident 2024-05-01
//! ```

mod client;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use muster_core::{
  record::{Incident, IncidentRecord, NewIncident},
  roster::{Category, SubRegion},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "http://localhost:8080";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "muster", about = "Command-line client for the muster incident server")]
struct Args {
  /// Path to a TOML config file (url, username, pin).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the muster server (default: http://localhost:8080).
  #[arg(long, env = "MUSTER_URL")]
  url: Option<String>,

  /// `supervisor` or a sub-region name.
  #[arg(long, env = "MUSTER_USER")]
  user: Option<String>,

  #[arg(long, env = "MUSTER_PIN")]
  pin: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List incidents, newest first.
  List {
    /// Case-insensitive search over name, state code and sub-region.
    #[arg(short, long)]
    query: Option<String>,
  },
  /// Report a new incident.
  Add(AddArgs),
  /// Delete an incident by id.
  Delete { id: String },
  /// Per-sub-region and per-category counts.
  Stats,
  /// Whether the server's live view is online.
  Status,
  /// Ask the server for a narrative summary.
  Summary {
    #[arg(long)]
    sub_region: Option<SubRegion>,
    #[arg(long)]
    label:      Option<String>,
  },
}

#[derive(ClapArgs, Debug)]
struct AddArgs {
  #[arg(long)]
  name:              String,
  #[arg(long)]
  state_code:        String,
  #[arg(long)]
  sub_region:        SubRegion,
  #[arg(long)]
  category:          Category,
  /// RFC 3339 timestamp; defaults to now.
  #[arg(long)]
  date_added:        Option<DateTime<Utc>>,
  #[arg(long)]
  period_of_absence: Option<String>,
  #[arg(long)]
  illness:           Option<String>,
  #[arg(long)]
  hospitalized:      bool,
  #[arg(long)]
  date_of_incident:  Option<String>,
  #[arg(long)]
  date_of_death:     Option<String>,
  #[arg(long)]
  reason:            Option<String>,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  pin:      String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: pick(args.url, file_cfg.url).unwrap_or_else(|| DEFAULT_URL.to_string()),
    username: pick(args.user, file_cfg.username).unwrap_or_default(),
    pin:      pick(args.pin, file_cfg.pin).unwrap_or_default(),
  };
  tracing::debug!(url = %api_config.base_url, user = %api_config.username, "connecting");

  let client = ApiClient::new(api_config)?;
  run(&client, args.command).await
}

fn pick(flag: Option<String>, file: String) -> Option<String> {
  flag.or_else(|| (!file.is_empty()).then_some(file))
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
  match command {
    Command::List { query } => {
      let records = client.list(query.as_deref()).await?;
      for record in &records {
        println!("{}", format_record(record));
      }
      println!("{} incident(s)", records.len());
    }
    Command::Add(add) => {
      let incident = new_incident(add)?;
      let id = client.create(&incident).await?;
      println!("{id}");
    }
    Command::Delete { id } => {
      client.delete(&id).await?;
      println!("deleted {id}");
    }
    Command::Stats => {
      let stats = client.stats().await?;
      println!("Total incidents: {}", stats.total);
      println!("By sub-region:");
      print_tally(&stats.per_sub_region);
      println!("By category:");
      print_tally(&stats.per_category);
    }
    Command::Status => {
      let status = client.status().await?;
      println!("{} ({} incident(s))", status.state, status.total);
      if let Some(err) = status.last_error {
        println!("last error: {err}");
      }
    }
    Command::Summary { sub_region, label } => {
      let summary = client.summary(label.as_deref(), sub_region).await?;
      println!("{summary}");
    }
  }
  Ok(())
}

// ─── Formatting ───────────────────────────────────────────────────────────────

fn format_record(record: &IncidentRecord) -> String {
  let date = record.date_added.get(..10).unwrap_or(&record.date_added);
  format!(
    "{date}  {:<12} {:<18} {:<14} {}  [{}]",
    record.sub_region,
    record.category_label(),
    record.state_code,
    record.name,
    record.id,
  )
}

fn print_tally(tally: &serde_json::Map<String, Value>) {
  for (label, count) in tally {
    let label = if label.is_empty() { "(unspecified)" } else { label };
    println!("  {label:<18} {count}");
  }
}

/// Assemble a [`NewIncident`] from `add` flags, requiring exactly the
/// payload fields the category needs.
fn new_incident(add: AddArgs) -> Result<NewIncident> {
  fn need(value: Option<String>, flag: &str, category: Category) -> Result<String> {
    match value {
      Some(v) if !v.trim().is_empty() => Ok(v),
      _ => bail!("--{flag} is required for category {category}"),
    }
  }

  let category = add.category;
  let incident = match category {
    Category::Absconded => Incident::Absconded {
      period_of_absence: need(add.period_of_absence, "period-of-absence", category)?,
    },
    Category::SickOrHospitalized => Incident::SickOrHospitalized {
      illness:      need(add.illness, "illness", category)?,
      hospitalized: add.hospitalized,
    },
    Category::Kidnapped => Incident::Kidnapped {
      date_of_incident: need(add.date_of_incident, "date-of-incident", category)?,
    },
    Category::Missing => Incident::Missing {
      date_of_incident: need(add.date_of_incident, "date-of-incident", category)?,
    },
    Category::Deceased => Incident::Deceased {
      date_of_death: need(add.date_of_death, "date-of-death", category)?,
      reason:        need(add.reason, "reason", category)?,
    },
  };

  let mut out = NewIncident::new(add.name, add.state_code, add.sub_region, incident);
  out.date_added = add.date_added;
  out.validate()?;
  Ok(out)
}
