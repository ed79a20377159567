//! REST client for the Mango Office VPBX API.
//!
//! Every call is a form-encoded POST carrying `vpbx_api_key`, `sign` and
//! `json` (see [`crm_core::signing`]). Stats are fetched with a two-step
//! protocol: `stats/request` returns a key, `stats/result` returns the
//! report for that key.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use serde::Serialize;

use crm_core::call_record::{parse_stats_csv, CallRecord, STATS_FIELDS};
use crm_core::signing::SignedForm;

use crate::config::MangoConfig;
use crate::error::MangoError;

const STATS_REQUEST_PATH: &str = "stats/request";
const STATS_RESULT_PATH: &str = "stats/result";
const RECORDING_PATH: &str = "queries/recording/post";

/// Upper bound on manually followed redirects for one download.
const MAX_REDIRECT_HOPS: usize = 5;

/// HTTP client for one Mango account.
pub struct MangoApi {
    /// Stats calls; default redirect handling.
    client: reqwest::Client,
    /// Recording calls and downloads; redirects are never followed automatically.
    recording_client: reqwest::Client,
    config: MangoConfig,
}

/// Where a recording can be fetched from.
#[derive(Debug)]
pub enum RecordingLink {
    /// The provider answered with a redirect to a temporary file URL.
    Redirect(String),
    /// The provider returned the file in the response body.
    Inline(DownloadedFile),
}

/// Raw bytes of a downloaded file.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Serialize)]
struct StatsRequest<'a> {
    date_from: String,
    date_to: String,
    fields: &'a str,
}

#[derive(Serialize)]
struct StatsResultRequest<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct RecordingRequest<'a> {
    recording_id: &'a str,
    action: &'static str,
}

impl MangoApi {
    /// Build the HTTP clients for an account.
    pub fn new(config: MangoConfig) -> Result<Self, MangoError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let recording_client = reqwest::Client::builder()
            .timeout(config.recording_timeout)
            .redirect(Policy::none())
            .build()?;
        Ok(Self {
            client,
            recording_client,
            config,
        })
    }

    pub fn config(&self) -> &MangoConfig {
        &self.config
    }

    // ---- stats ----

    /// Fetch every call that started within the last `lookback`.
    ///
    /// A missing report key or an empty report is zero calls, not an error.
    /// Transport failures and unexpected statuses propagate.
    pub async fn fetch_calls(&self, lookback: Duration) -> Result<Vec<CallRecord>, MangoError> {
        let now = chrono::Utc::now().timestamp();
        let from = now.saturating_sub(i64::try_from(lookback.as_secs()).unwrap_or(i64::MAX));

        let Some(key) = self.request_stats(from, now).await? else {
            tracing::info!(from, to = now, "Mango returned no stats key, nothing to sync");
            return Ok(Vec::new());
        };

        let body = self.fetch_stats_result(&key).await?;
        let records = parse_stats_body(&body)?;
        tracing::debug!(count = records.len(), "Fetched Mango call records");
        Ok(records)
    }

    /// Submit a stats report request for `[from, to]` (unix seconds).
    ///
    /// Returns the result key, or `None` if the response carried none.
    pub async fn request_stats(&self, from: i64, to: i64) -> Result<Option<String>, MangoError> {
        let body = StatsRequest {
            date_from: from.to_string(),
            date_to: to.to_string(),
            fields: STATS_FIELDS,
        };
        let response = self.post_signed(&self.client, STATS_REQUEST_PATH, &body).await?;
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;

        let key = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("key").and_then(|k| k.as_str()).map(str::to_string))
            .filter(|k| !k.is_empty());
        Ok(key)
    }

    /// Fetch the report for a key. While the provider is still building it
    /// (HTTP 204) the request is repeated, up to the configured attempts;
    /// after that the report is treated as empty.
    pub async fn fetch_stats_result(&self, key: &str) -> Result<String, MangoError> {
        let body = StatsResultRequest { key };
        let attempts = self.config.result_poll_attempts.max(1);

        for attempt in 1..=attempts {
            let response = self.post_signed(&self.client, STATS_RESULT_PATH, &body).await?;
            if response.status() == StatusCode::NO_CONTENT {
                tracing::debug!(attempt, "Mango stats result not ready yet");
                if attempt < attempts {
                    tokio::time::sleep(self.config.result_poll_delay).await;
                }
                continue;
            }
            let response = Self::ensure_success(response).await?;
            return Ok(response.text().await?);
        }

        tracing::warn!(attempts, "Mango stats result never became ready");
        Ok(String::new())
    }

    // ---- recordings ----

    /// Ask the provider where a recording can be downloaded.
    ///
    /// A 301/302 answer yields [`RecordingLink::Redirect`]; a 2xx answer with
    /// a non-JSON body is the file itself. Anything else is an error that
    /// keeps the `Location` header, if any, for the caller to inspect.
    pub async fn recording_link(&self, provider_id: &str) -> Result<RecordingLink, MangoError> {
        let body = RecordingRequest {
            recording_id: provider_id,
            action: "download",
        };
        let response = self
            .post_signed(&self.recording_client, RECORDING_PATH, &body)
            .await?;

        let status = response.status();
        if matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND) {
            if let Some(location) = header_str(&response, LOCATION) {
                return Ok(RecordingLink::Redirect(location));
            }
        }

        let response = Self::ensure_success(response).await?;
        let content_type = header_str(&response, CONTENT_TYPE);
        if content_type.as_deref().is_some_and(|ct| ct.contains("json")) {
            let body = response.text().await.unwrap_or_default();
            return Err(MangoError::Api {
                status: status.as_u16(),
                body,
                location: None,
            });
        }
        let bytes = read_body(response).await?;
        Ok(RecordingLink::Inline(DownloadedFile {
            bytes,
            content_type,
        }))
    }

    /// Download a file, following redirects by hand.
    pub async fn download(&self, url: &str) -> Result<DownloadedFile, MangoError> {
        let mut current = reqwest::Url::parse(url)
            .map_err(|e| MangoError::Decode(format!("invalid download URL {url}: {e}")))?;

        for _ in 0..=MAX_REDIRECT_HOPS {
            let response = self.recording_client.get(current.clone()).send().await?;
            if response.status().is_redirection() {
                let location = header_str(&response, LOCATION).ok_or_else(|| {
                    MangoError::Decode(format!("redirect from {current} without Location"))
                })?;
                current = current
                    .join(&location)
                    .map_err(|e| MangoError::Decode(format!("invalid Location {location}: {e}")))?;
                continue;
            }

            let response = Self::ensure_success(response).await?;
            let content_type = header_str(&response, CONTENT_TYPE);
            let bytes = read_body(response).await?;
            return Ok(DownloadedFile {
                bytes,
                content_type,
            });
        }

        Err(MangoError::Decode(format!(
            "more than {MAX_REDIRECT_HOPS} redirects while downloading {url}"
        )))
    }

    // ---- private helpers ----

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn post_signed<T: Serialize>(
        &self,
        client: &reqwest::Client,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, MangoError> {
        let form = SignedForm::from_body(&self.config.api_key, &self.config.api_salt, body)
            .map_err(|e| MangoError::Decode(e.to_string()))?;
        Ok(client.post(self.endpoint(path)).form(&form).send().await?)
    }

    /// Return the response on a 2xx status; otherwise a
    /// [`MangoError::Api`] with status, body text and `Location` header.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, MangoError> {
        let status = response.status();
        if !status.is_success() {
            let location = header_str(&response, LOCATION);
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(MangoError::Api {
                status: status.as_u16(),
                body,
                location,
            });
        }
        Ok(response)
    }
}

/// Interpret a stats result body: JSON (array or wrapped list) or the
/// semicolon-delimited report text.
pub fn parse_stats_body(body: &str) -> Result<Vec<CallRecord>, MangoError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|e| MangoError::Decode(format!("stats result: {e}")))?;
        return Ok(CallRecord::list_from_json(&value));
    }
    Ok(parse_stats_csv(trimmed))
}

fn header_str(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, MangoError> {
    let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    Ok(bytes)
}
