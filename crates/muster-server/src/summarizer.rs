//! [`Summarizer`] backed by the Gemini `generateContent` endpoint.

use std::time::Duration;

use muster_core::{
  Error,
  record::IncidentRecord,
  summary::{Summarizer, SummaryFuture, build_prompt},
};
use reqwest::Client;
use serde_json::{Value, json};

use crate::config::SummarizerConfig;

/// Header carrying the API key. The key must never appear in the URL.
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiSummarizer {
  client:   Client,
  endpoint: String,
  model:    String,
  api_key:  String,
}

impl GeminiSummarizer {
  pub fn new(config: &SummarizerConfig) -> Result<Self, crate::Error> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self {
      client,
      endpoint: config.endpoint.trim_end_matches('/').to_owned(),
      model: config.model.clone(),
      api_key: config.api_key.clone(),
    })
  }

  fn url(&self) -> String {
    format!("{}/models/{}:generateContent", self.endpoint, self.model)
  }

  async fn generate(&self, prompt: String) -> muster_core::Result<String> {
    let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });

    let resp = self
      .client
      .post(self.url())
      .header(API_KEY_HEADER, &self.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| Error::Summarization(e.without_url().to_string()))?;

    let status = resp.status();
    let payload: Value = resp
      .json()
      .await
      .map_err(|e| Error::Summarization(format!("{status}: {}", e.without_url())))?;

    if !status.is_success() {
      let message = error_message(&payload).unwrap_or_else(|| status.to_string());
      tracing::warn!(%status, %message, "summarization request failed");
      return Err(Error::Summarization(message));
    }
    extract_text(&payload)
  }
}

impl Summarizer for GeminiSummarizer {
  fn summarize<'a>(&'a self, records: &'a [IncidentRecord], label: &'a str) -> SummaryFuture<'a> {
    Box::pin(self.generate(build_prompt(records, label)))
  }
}

/// Concatenate the text parts of the first candidate.
pub fn extract_text(payload: &Value) -> muster_core::Result<String> {
  if let Some(message) = error_message(payload) {
    return Err(Error::Summarization(message));
  }
  let parts = payload
    .pointer("/candidates/0/content/parts")
    .and_then(Value::as_array)
    .ok_or_else(|| Error::Summarization("response contained no candidates".into()))?;

  let text: String = parts
    .iter()
    .filter_map(|p| p.get("text").and_then(Value::as_str))
    .collect();
  if text.trim().is_empty() {
    return Err(Error::Summarization("response contained no text".into()));
  }
  Ok(text)
}

fn error_message(payload: &Value) -> Option<String> {
  payload
    .pointer("/error/message")
    .and_then(Value::as_str)
    .map(str::to_owned)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn text_parts_are_joined() {
    let payload = json!({
      "candidates": [{
        "content": { "parts": [{ "text": "Daura saw " }, { "text": "two incidents." }] }
      }]
    });
    assert_eq!(extract_text(&payload).unwrap(), "Daura saw two incidents.");
  }

  #[test]
  fn service_errors_surface_verbatim() {
    let payload = json!({ "error": { "code": 400, "message": "API key not valid" } });
    match extract_text(&payload) {
      Err(Error::Summarization(m)) => assert_eq!(m, "API key not valid"),
      other => panic!("unexpected: {other:?}"),
    }
  }

  #[test]
  fn empty_candidates_are_an_error() {
    assert!(matches!(
      extract_text(&json!({ "candidates": [] })),
      Err(Error::Summarization(_))
    ));
    assert!(matches!(
      extract_text(&json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] })),
      Err(Error::Summarization(_))
    ));
  }

  #[tokio::test]
  async fn transport_errors_do_not_reveal_the_key() {
    let s = GeminiSummarizer::new(&SummarizerConfig {
      endpoint:     "http://127.0.0.1:1/v1beta".into(),
      model:        "m".into(),
      api_key:      "SECRET-KEY-123".into(),
      timeout_secs: 5,
    })
    .unwrap();
    let err = s.summarize(&[], "all sub-regions").await.unwrap_err();
    assert!(matches!(err, Error::Summarization(_)));
    let message = err.to_string();
    assert!(!message.contains("SECRET-KEY-123"), "{message}");
    assert!(!s.url().contains("SECRET-KEY-123"));
  }

  #[test]
  fn url_includes_model() {
    let s = GeminiSummarizer::new(&SummarizerConfig {
      endpoint:     "https://example.test/v1beta/".into(),
      model:        "gemini-test".into(),
      api_key:      "k".into(),
      timeout_secs: 5,
    })
    .unwrap();
    assert_eq!(s.url(), "https://example.test/v1beta/models/gemini-test:generateContent");
  }
}
