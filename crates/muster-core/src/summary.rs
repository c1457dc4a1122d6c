//! Narrative summarization of the current incidents.
//!
//! The core only builds the prompt and defines the [`Summarizer`] seam; the
//! server supplies an implementation that talks to a text-generation service.

use std::{fmt::Write as _, future::Future, pin::Pin};

use crate::{Error, Result, record::IncidentRecord, stats::Stats};

/// Records beyond this many are left out of the prompt; the tally still
/// covers all of them.
pub const PROMPT_RECORD_LIMIT: usize = 200;

pub type SummaryFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Produces a prose summary of a set of incidents.
///
/// Object-safe so the API can hold an `Arc<dyn Summarizer>`. Implementations
/// must not retry; a failure surfaces as [`Error::Summarization`] carrying the
/// service's message.
pub trait Summarizer: Send + Sync {
  fn summarize<'a>(&'a self, records: &'a [IncidentRecord], label: &'a str) -> SummaryFuture<'a>;
}

/// Used when no summarization service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSummarizer;

impl Summarizer for NoSummarizer {
  fn summarize<'a>(&'a self, _: &'a [IncidentRecord], _: &'a str) -> SummaryFuture<'a> {
    Box::pin(async {
      Err(Error::Summarization(
        "no summarization service is configured".into(),
      ))
    })
  }
}

/// Build the instruction text sent to the summarization service.
///
/// `label` names the scope being summarized, e.g. a sub-region or
/// "all sub-regions".
pub fn build_prompt(records: &[IncidentRecord], label: &str) -> String {
  let stats = Stats::for_roster(records);
  let mut prompt = format!(
    "You are assisting a supervisor who oversees corps members across several \
     sub-regions. Write a concise narrative report on the incidents for {label}. \
     Highlight the most affected sub-regions and categories, notable patterns \
     and anything that needs urgent attention. Use plain prose without \
     headings.\n\n"
  );
  prompt.push_str(&stats.summary_lines());
  prompt.push_str("\nIncidents (newest first):\n");
  for record in records.iter().take(PROMPT_RECORD_LIMIT) {
    let _ = write!(
      prompt,
      "- {} ({}), {}, {}",
      record.name,
      record.state_code,
      record.sub_region,
      record.category_label()
    );
    let details = payload_details(record);
    if !details.is_empty() {
      let _ = write!(prompt, ": {details}");
    }
    let _ = writeln!(prompt, " [added {}]", record.date_added);
  }
  if records.len() > PROMPT_RECORD_LIMIT {
    let _ = writeln!(
      prompt,
      "({} older incidents omitted)",
      records.len() - PROMPT_RECORD_LIMIT
    );
  }
  prompt
}

fn payload_details(record: &IncidentRecord) -> String {
  use crate::record::Incident;

  match &record.incident {
    Incident::Absconded { period_of_absence } => format!("absent {period_of_absence}"),
    Incident::SickOrHospitalized { illness, hospitalized } => {
      if *hospitalized {
        format!("{illness}, hospitalized")
      } else {
        illness.clone()
      }
    }
    Incident::Kidnapped { date_of_incident } | Incident::Missing { date_of_incident } => {
      format!("since {date_of_incident}")
    }
    Incident::Deceased { date_of_death, reason } => format!("died {date_of_death}, {reason}"),
    Incident::Unrecognized { .. } => String::new(),
  }
}
