//! Readwise HTTP client.
//!
//! Sends highlights to the Readwise v2 API in batches, with bounded
//! retries and request spacing to stay under the documented rate
//! limit. The export pipeline talks to the [`HighlightSender`] trait,
//! so tests can substitute a stub without any network.

use crate::error::{Error, Result};
use crate::model::ClippingRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Readwise API base URL.
pub const DEFAULT_BASE_URL: &str = "https://readwise.io/api/v2";

/// Maximum highlights per POST, per Readwise API guidance.
pub const MAX_BATCH_SIZE: usize = 100;

/// Readwise allows 240 requests/minute; one request per 250ms stays
/// under that with headroom.
pub const REQUEST_INTERVAL: Duration = Duration::from_millis(250);

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(8);
const RETRY_AFTER_CAP: Duration = Duration::from_secs(30);

/// One highlight in the shape the Readwise `/highlights/` endpoint
/// accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadwisePayload {
    pub text: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub source_type: &'static str,
    pub category: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_at: Option<String>,
}

impl ReadwisePayload {
    /// Convert a parsed clipping into the Readwise payload shape.
    ///
    /// Page numbers win over locations; a range token keeps only its
    /// first number since Readwise wants a single integer. An empty
    /// author is omitted entirely.
    #[must_use]
    pub fn from_record(record: &ClippingRecord) -> Self {
        let (location, location_type) = if let Some(page) = &record.page {
            (parse_location(page), Some("page"))
        } else if let Some(loc) = &record.location {
            (parse_location(loc), Some("location"))
        } else {
            (None, None)
        };

        Self {
            text: record.content.clone(),
            title: record.title.clone(),
            author: if record.author.is_empty() {
                None
            } else {
                Some(record.author.clone())
            },
            source_type: "kindle",
            category: "books",
            location,
            location_type: location.and(location_type),
            highlighted_at: record
                .timestamp
                .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }
}

/// First number of a device location token (`"1406-1407"` -> 1406).
fn parse_location(token: &str) -> Option<i64> {
    token.split('-').next()?.trim().parse().ok()
}

/// Outcome for one highlight within a batch send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Sent { readwise_id: Option<String> },
    Failed { reason: String },
}

/// Interface the export pipeline uses to deliver highlights.
///
/// `send_highlights` returns one outcome per input payload, in order.
/// It only returns `Err` when the credentials are rejected; every
/// other failure degrades to per-item outcomes so later batches still
/// get their chance.
pub trait HighlightSender: Send + Sync {
    /// Check that the configured token is accepted by the API.
    fn validate_token(&self) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Send highlights, batching and retrying internally.
    fn send_highlights(
        &self,
        payloads: &[ReadwisePayload],
    ) -> impl std::future::Future<Output = Result<Vec<ItemOutcome>>> + Send;
}

/// Tunables for the HTTP client.
#[derive(Debug, Clone)]
pub struct ReadwiseClientConfig {
    pub base_url: String,
    pub max_batch_size: usize,
    pub request_interval: Duration,
    pub max_retries: u32,
    pub timeout: Duration,
}

impl Default for ReadwiseClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_batch_size: MAX_BATCH_SIZE,
            request_interval: REQUEST_INTERVAL,
            max_retries: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Readwise API client.
pub struct ReadwiseClient {
    client: reqwest::Client,
    token: String,
    config: ReadwiseClientConfig,
}

#[derive(Debug, Serialize)]
struct HighlightsRequest<'a> {
    highlights: &'a [ReadwisePayload],
}

/// The bulk endpoint responds with the affected books, each listing
/// the ids of the highlights it created or updated.
#[derive(Debug, Deserialize)]
struct BookResponse {
    #[serde(default)]
    modified_highlights: Vec<i64>,
}

impl ReadwiseClient {
    /// Create a client against the public Readwise API.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_config(token, ReadwiseClientConfig::default())
    }

    /// Create a client with custom configuration (base URL override,
    /// batch size, retry budget).
    pub fn with_config(token: impl Into<String>, config: ReadwiseClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            config,
        }
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Send one batch, retrying transient failures. Non-fatal failures
    /// come back as `Err` and are mapped to per-item outcomes by the
    /// caller.
    async fn send_batch(&self, batch: &[ReadwisePayload]) -> Result<Vec<ItemOutcome>> {
        let url = format!("{}/highlights/", self.config.base_url);
        let mut attempt: u32 = 0;

        loop {
            let response = self
                .client
                .post(&url)
                .header("Authorization", self.auth_header())
                .timeout(self.config.timeout)
                .json(&HighlightsRequest { highlights: batch })
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(Self::distribute_ids(resp, batch.len()).await);
                }
                Ok(resp) if resp.status() == reqwest::StatusCode::UNAUTHORIZED
                    || resp.status() == reqwest::StatusCode::FORBIDDEN =>
                {
                    return Err(Error::Authentication);
                }
                Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.config.max_retries {
                        return Err(Error::RateLimitExhausted { attempts: attempt + 1 });
                    }
                    let delay = retry_after(&resp).unwrap_or_else(|| backoff_delay(attempt));
                    tracing::warn!(attempt, ?delay, "rate limited by Readwise, backing off");
                    tokio::time::sleep(delay).await;
                }
                Ok(resp) if resp.status().is_server_error() => {
                    if attempt >= self.config.max_retries {
                        let status = resp.status().as_u16();
                        let body = truncate_body(resp.text().await.unwrap_or_default());
                        return Err(Error::Network(format!(
                            "Readwise server error (HTTP {status}) after {} attempts: {body}",
                            attempt + 1
                        )));
                    }
                    let delay = backoff_delay(attempt);
                    tracing::warn!(attempt, status = %resp.status(), "server error, retrying");
                    tokio::time::sleep(delay).await;
                }
                Ok(resp) => {
                    // Remaining 4xx: the payload itself was rejected,
                    // retrying the same bytes cannot help.
                    let status = resp.status().as_u16();
                    let body = truncate_body(resp.text().await.unwrap_or_default());
                    return Err(Error::PayloadRejected { status, body });
                }
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        return Err(Error::Network(format!(
                            "request failed after {} attempts: {e}",
                            attempt + 1
                        )));
                    }
                    let delay = backoff_delay(attempt);
                    tracing::warn!(attempt, error = %e, "request error, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }

    /// Map the response's highlight ids onto the batch, in order. If
    /// the counts disagree the ids are dropped rather than misassigned.
    async fn distribute_ids(resp: reqwest::Response, batch_len: usize) -> Vec<ItemOutcome> {
        let ids: Vec<i64> = match resp.json::<Vec<BookResponse>>().await {
            Ok(books) => books
                .into_iter()
                .flat_map(|b| b.modified_highlights)
                .collect(),
            Err(_) => Vec::new(),
        };

        if ids.len() == batch_len {
            ids.into_iter()
                .map(|id| ItemOutcome::Sent {
                    readwise_id: Some(id.to_string()),
                })
                .collect()
        } else {
            vec![ItemOutcome::Sent { readwise_id: None }; batch_len]
        }
    }
}

impl HighlightSender for ReadwiseClient {
    async fn validate_token(&self) -> Result<bool> {
        let url = format!("{}/auth/", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| Error::Network(format!("token validation request failed: {e}")))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Ok(false),
            s => Err(Error::Network(format!(
                "unexpected status from token validation: {s}"
            ))),
        }
    }

    async fn send_highlights(&self, payloads: &[ReadwisePayload]) -> Result<Vec<ItemOutcome>> {
        let mut outcomes = Vec::with_capacity(payloads.len());

        for (i, batch) in payloads.chunks(self.config.max_batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.request_interval).await;
            }
            tracing::debug!(batch = i, size = batch.len(), "sending highlight batch");

            match self.send_batch(batch).await {
                Ok(batch_outcomes) => outcomes.extend(batch_outcomes),
                // Bad credentials fail every subsequent batch too, so
                // stop the whole send.
                Err(e @ Error::Authentication) => return Err(e),
                Err(e) => {
                    let reason = e.to_string();
                    tracing::warn!(batch = i, %reason, "batch failed");
                    outcomes.extend(
                        std::iter::repeat_with(|| ItemOutcome::Failed {
                            reason: reason.clone(),
                        })
                        .take(batch.len()),
                    );
                }
            }
        }

        Ok(outcomes)
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE.saturating_mul(2u32.saturating_pow(attempt));
    exp.min(BACKOFF_CAP)
}

fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    let secs: u64 = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    Some(Duration::from_secs(secs).min(RETRY_AFTER_CAP))
}

fn truncate_body(body: String) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body
    }
}
