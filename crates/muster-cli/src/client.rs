//! Async HTTP client wrapping the muster JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use muster_core::{
  record::{Document, IncidentRecord, NewIncident, RecordId},
  roster::SubRegion,
};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Connection settings for the muster API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub pin:      String,
}

/// Async HTTP client for the muster JSON REST API.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

/// `GET /api/status` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
  pub state:      String,
  pub last_error: Option<String>,
  pub total:      usize,
}

/// `GET /api/stats` response; tallies keep the server's order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStats {
  pub per_sub_region: Map<String, Value>,
  pub per_category:   Map<String, Value>,
  pub total:          usize,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.pin))
    }
  }

  // ── Incidents ─────────────────────────────────────────────────────────────

  /// `GET /api/incidents[?q=<text>]`
  pub async fn list(&self, query: Option<&str>) -> Result<Vec<IncidentRecord>> {
    let mut req = self.auth(self.client.get(self.url("/incidents")));
    if let Some(q) = query {
      req = req.query(&[("q", q)]);
    }
    let resp = req.send().await.context("GET /incidents failed")?;
    let docs: Vec<Value> = check(resp, "GET /incidents")
      .await?
      .json()
      .await
      .context("deserialising incidents")?;

    docs
      .into_iter()
      .map(|v| {
        Document::from_json(v)
          .map(IncidentRecord::from_document)
          .ok_or_else(|| anyhow!("incident without an id in response"))
      })
      .collect()
  }

  /// `POST /api/incidents`, returning the new id.
  pub async fn create(&self, incident: &NewIncident) -> Result<RecordId> {
    #[derive(Deserialize)]
    struct Created {
      id: RecordId,
    }

    let resp = self
      .auth(self.client.post(self.url("/incidents")))
      .json(incident)
      .send()
      .await
      .context("POST /incidents failed")?;
    let created: Created = check(resp, "POST /incidents")
      .await?
      .json()
      .await
      .context("deserialising created id")?;
    Ok(created.id)
  }

  /// `DELETE /api/incidents/<id>`
  pub async fn delete(&self, id: &str) -> Result<()> {
    let path = format!("/incidents/{id}");
    let resp = self
      .auth(self.client.delete(self.url(&path)))
      .send()
      .await
      .with_context(|| format!("DELETE {path} failed"))?;
    check(resp, &format!("DELETE {path}")).await?;
    Ok(())
  }

  // ── Aggregates ────────────────────────────────────────────────────────────

  /// `GET /api/stats`
  pub async fn stats(&self) -> Result<RemoteStats> {
    let resp = self
      .auth(self.client.get(self.url("/stats")))
      .send()
      .await
      .context("GET /stats failed")?;
    check(resp, "GET /stats")
      .await?
      .json()
      .await
      .context("deserialising stats")
  }

  /// `GET /api/status`
  pub async fn status(&self) -> Result<RemoteStatus> {
    let resp = self
      .auth(self.client.get(self.url("/status")))
      .send()
      .await
      .context("GET /status failed")?;
    check(resp, "GET /status")
      .await?
      .json()
      .await
      .context("deserialising status")
  }

  /// `POST /api/summary`
  pub async fn summary(&self, label: Option<&str>, sub_region: Option<SubRegion>) -> Result<String> {
    #[derive(Deserialize)]
    struct Summary {
      summary: String,
    }

    let resp = self
      .auth(self.client.post(self.url("/summary")))
      .json(&json!({ "label": label, "subRegion": sub_region }))
      .send()
      .await
      .context("POST /summary failed")?;
    let body: Summary = check(resp, "POST /summary")
      .await?
      .json()
      .await
      .context("deserialising summary")?;
    Ok(body.summary)
  }
}

/// Turn a non-success response into an error carrying the server's message.
async fn check(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let message = resp
    .json::<Value>()
    .await
    .ok()
    .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned));
  match message {
    Some(m) => Err(anyhow!("{what} → {status}: {m}")),
    None => Err(anyhow!("{what} → {status}")),
  }
}
