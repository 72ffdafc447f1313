//! HTTP client for the content API's bulk endpoints.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use pleasance_core::config::CatalogConfig;
use pleasance_core::types::{SectionResult, Subject};

/// Subject type understood by the bulk endpoints.
const SUBJECT_TYPE: &str = "kink";

const QUEUE_TIMEOUT: Duration = Duration::from_secs(30);
const PUSH_TIMEOUT: Duration = Duration::from_secs(60);
const MARK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum CatalogError {
    /// 403, the agent key is missing or wrong.
    #[error("content API refused the agent credentials (set AGENT_SECRET)")]
    Unauthorized,
    #[error("content API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("content API request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Response of `POST /api/bulk/sections`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushSummary {
    #[serde(default)]
    pub upserted: usize,
    #[serde(default)]
    pub failed: usize,
}

#[derive(Deserialize)]
struct QueueResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct PushRequest<'a> {
    sections: &'a [SectionResult],
}

#[derive(Serialize)]
struct MarkProcessedRequest<'a> {
    #[serde(rename = "type")]
    subject_type: &'static str,
    ids: &'a [String],
}

// ─────────────────────────────────────────────
// CatalogClient
// ─────────────────────────────────────────────

/// Client for the content API, authenticated as one agent.
pub struct CatalogClient {
    client: reqwest::Client,
    /// API base URL, without trailing slash.
    base_url: String,
    /// `X-Agent-Key` / `X-Agent-Id`, sent with every request.
    agent_headers: HeaderMap,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.agent_headers.contains_key("x-agent-key"))
            .finish()
    }
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let mut agent_headers = HeaderMap::new();
        let pairs = [
            ("x-agent-key", config.agent_secret.as_deref().unwrap_or_default()),
            ("x-agent-id", config.agent_id.as_str()),
        ];
        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            match HeaderValue::from_str(value) {
                Ok(val) => {
                    agent_headers.insert(HeaderName::from_static(key), val);
                }
                Err(_) => warn!("Invalid header value for {}", key),
            }
        }

        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            agent_headers,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch up to `limit` subjects, either still unprocessed or already processed.
    pub async fn fetch_queue(
        &self,
        processed: bool,
        limit: usize,
    ) -> Result<Vec<Subject>, CatalogError> {
        let response = self
            .client
            .get(self.url("/api/bulk/queue"))
            .headers(self.agent_headers.clone())
            .query(&[
                ("type", SUBJECT_TYPE.to_string()),
                ("processed", processed.to_string()),
                ("limit", limit.to_string()),
            ])
            .timeout(QUEUE_TIMEOUT)
            .send()
            .await?;

        let queue: QueueResponse = check_status(response).await?.json().await?;
        let received = queue.items.len();
        let subjects: Vec<Subject> = queue
            .items
            .into_iter()
            .filter_map(|item| match Subject::deserialize(&item) {
                Ok(subject) => Some(subject),
                Err(e) => {
                    warn!(item = %item, "Skipping queue entry: {}", e);
                    None
                }
            })
            .collect();
        debug!(processed, received, count = subjects.len(), "Fetched queue");
        Ok(subjects)
    }

    /// Upsert generated sections.
    pub async fn push_sections(
        &self,
        sections: &[SectionResult],
    ) -> Result<PushSummary, CatalogError> {
        let response = self
            .client
            .post(self.url("/api/bulk/sections"))
            .headers(self.agent_headers.clone())
            .json(&PushRequest { sections })
            .timeout(PUSH_TIMEOUT)
            .send()
            .await?;

        let summary: PushSummary = check_status(response).await?.json().await?;
        info!(
            upserted = summary.upserted,
            failed = summary.failed,
            "Pushed sections"
        );
        Ok(summary)
    }

    /// Flag subjects as processed so they leave the unprocessed queue.
    pub async fn mark_processed(&self, ids: &[String]) -> Result<(), CatalogError> {
        let response = self
            .client
            .post(self.url("/api/bulk/mark-processed"))
            .headers(self.agent_headers.clone())
            .json(&MarkProcessedRequest {
                subject_type: SUBJECT_TYPE,
                ids,
            })
            .timeout(MARK_TIMEOUT)
            .send()
            .await?;

        check_status(response).await?;
        debug!(count = ids.len(), "Marked subjects processed");
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::FORBIDDEN {
        return Err(CatalogError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CatalogError::Status {
        status,
        body: pleasance_core::utils::truncate_string(&body, 500),
    })
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
