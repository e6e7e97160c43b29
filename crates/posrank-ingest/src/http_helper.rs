//! HTTP transport and bounded retry shared by all exchange adapters.
//!
//! Adapters talk to [`HttpTransport`] rather than to reqwest directly so that
//! fetch behavior (thresholds, retry exhaustion, weekend skipping) can be
//! driven by scripted transports in tests.

use std::time::Duration;

use posrank_core::error::RankError;
use tracing::warn;

/// Status code and raw body of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body as UTF-8 with invalid sequences replaced and any BOM removed.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim_start_matches('\u{feff}').to_string()
    }
}

/// Blocking request interface. An `Err` is always a transport failure
/// (connect, timeout, reset); any received response, whatever its status,
/// is an `Ok`.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, RankError>;

    fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<HttpResponse, RankError>;
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

/// Production transport over `reqwest::blocking`.
///
/// Must be constructed and dropped outside an async context; the runner
/// builds one inside each pipeline's blocking task.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = reqwest::blocking::Client::builder().timeout(timeout);
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua);
        }
        Ok(Self { client: builder.build()? })
    }

    fn finish(resp: reqwest::blocking::Response) -> Result<HttpResponse, RankError> {
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(|e| RankError::Transport(e.to_string()))?;
        Ok(HttpResponse { status, body: body.to_vec() })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, RankError> {
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let resp = req.send().map_err(|e| RankError::Transport(format!("GET {url}: {e}")))?;
        Self::finish(resp)
    }

    fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<HttpResponse, RankError> {
        let resp = self.client.post(url).form(form).send().map_err(|e| RankError::Transport(format!("POST {url}: {e}")))?;
        Self::finish(resp)
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Fixed attempt budget with immediate retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    /// `max_attempts` of 0 is treated as 1.
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1) }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds or the budget is spent. `op` receives the
    /// 1-based attempt number.
    pub fn run<T>(&self, label: &str, mut op: impl FnMut(u32) -> Result<T, RankError>) -> Result<T, RankError> {
        for attempt in 1..=self.max_attempts {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => warn!("[{label}] attempt {attempt}/{} failed: {e}", self.max_attempts),
            }
        }
        Err(RankError::RetriesExhausted { label: label.to_string(), attempts: self.max_attempts })
    }
}
