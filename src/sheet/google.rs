use async_trait::async_trait;
use rand::Rng;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::client::SheetClient;
use super::types::{cell_range, quote_worksheet, CellWrite, Row};
use crate::error::{Result, SyncError};
use crate::logging::log_preview;

pub const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";

const RETRY_BASE_DELAY_MS: u64 = 500;
const RETRY_MAX_DELAY_MS: u64 = 5_000;
const RETRY_MAX_JITTER_MS: u64 = 500;

/// Sheets API v4 client for one spreadsheet
#[derive(Debug)]
pub struct GoogleSheetsClient {
    client: reqwest::Client,
    base_url: Url,
    spreadsheet_id: String,
    access_token: String,
    max_retries: u32,
    request_delay: Duration,
    /// Earliest instant the next request may be sent
    next_request: Mutex<Instant>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl GoogleSheetsClient {
    pub fn new(
        base_url: &str,
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| SyncError::configuration(format!("Invalid API base URL '{}': {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
            max_retries,
            request_delay: Duration::ZERO,
            next_request: Mutex::new(Instant::now()),
        })
    }

    /// Keep at least `delay` between any two requests, retries included
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Wait for this request's slot and reserve the next one
    async fn throttle(&self) {
        let mut next = self.next_request.lock().await;
        if *next > Instant::now() {
            tokio::time::sleep_until(*next).await;
        }
        *next = Instant::now() + self.request_delay;
    }

    fn endpoint(&self, tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::configuration("API base URL cannot have a path"))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .extend(tail);
        Ok(url)
    }

    /// Send a request, retrying rate limits, server errors and timeouts
    async fn send_with_retry<F>(&self, what: &str, build: F) -> std::result::Result<Response, String>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            self.throttle().await;
            let retryable = match build().bearer_auth(&self.access_token).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let message = format!("{} returned {}: {}", what, status, log_preview(body.trim()));
                    if !is_retryable_status(status) {
                        return Err(message);
                    }
                    message
                }
                Err(e) if e.is_timeout() || e.is_connect() => format!("{} failed: {}", what, e),
                Err(e) => return Err(format!("{} failed: {}", what, e)),
            };

            if attempt >= self.max_retries {
                warn!(attempt, "{} (final)", retryable);
                return Err(retryable);
            }

            let delay = with_jitter(backoff_delay(attempt));
            warn!(attempt, delay_ms = delay.as_millis() as u64, "{}; retrying", retryable);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl SheetClient for GoogleSheetsClient {
    async fn read_rows(&self, worksheet: &str, skip_header_rows: u32) -> Result<Vec<Row>> {
        let range = quote_worksheet(worksheet);
        let url = self.endpoint(&["values", &range])?;

        let response = self
            .send_with_retry("values.get", || {
                self.client
                    .get(url.clone())
                    .query(&[("majorDimension", "ROWS"), ("valueRenderOption", "FORMATTED_VALUE")])
            })
            .await
            .map_err(SyncError::fetch)?;

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| SyncError::fetch(format!("Invalid values.get response: {}", e)))?;

        let rows: Vec<Row> = body
            .values
            .into_iter()
            .skip(skip_header_rows as usize)
            .map(|row| row.into_iter().map(value_to_string).collect())
            .collect();

        debug!(worksheet, rows = rows.len(), "Fetched remote rows");
        Ok(rows)
    }

    async fn write_cells(&self, worksheet: &str, row_position: u32, cells: &[CellWrite]) -> Result<()> {
        if cells.is_empty() {
            return Ok(());
        }

        let url = self.endpoint(&["values:batchUpdate"])?;
        let data: Vec<Value> = cells
            .iter()
            .map(|cell| {
                json!({
                    "range": cell_range(worksheet, &cell.column, row_position),
                    "majorDimension": "ROWS",
                    "values": [[cell.value]],
                })
            })
            .collect();

        let request_body = json!({
            "valueInputOption": "RAW",
            "data": data,
        });

        self.send_with_retry("values.batchUpdate", || {
            self.client.post(url.clone()).json(&request_body)
        })
        .await
        .map_err(|message| SyncError::write(row_position, message))?;

        Ok(())
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(factor).min(RETRY_MAX_DELAY_MS))
}

/// Add up to a quarter of `delay` (at most 500 ms) of random spread
fn with_jitter(delay: Duration) -> Duration {
    let max_jitter = (delay.as_millis() as u64 / 4).min(RETRY_MAX_JITTER_MS);
    if max_jitter == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => if b { "TRUE".to_string() } else { "FALSE".to_string() },
        other => other.to_string(),
    }
}

/// Read a bearer token from a credentials file.
///
/// The file holds either the raw token or a JSON object with an
/// `access_token` (or `token`) field.
pub fn load_access_token(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        SyncError::configuration(format!("Failed to read credentials '{}': {}", path.display(), e))
    })?;
    let raw = raw.trim();

    if raw.starts_with('{') {
        let parsed: Value = serde_json::from_str(raw).map_err(|e| {
            SyncError::configuration(format!("Invalid credentials JSON '{}': {}", path.display(), e))
        })?;
        return parsed
            .get("access_token")
            .or_else(|| parsed.get("token"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                SyncError::configuration(format!("No access_token in credentials '{}'", path.display()))
            });
    }

    if raw.is_empty() {
        return Err(SyncError::configuration(format!(
            "Credentials file '{}' is empty",
            path.display()
        )));
    }

    Ok(raw.to_string())
}
