//! HTTP Executor: issues single requests with authentication, per-request
//! timeout and bounded retry of transient failures, returning normalized
//! response records.

use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::{Response, StatusCode, Url};
use serde_json::Value;
use slog::{Logger, debug, warn};
use thiserror::Error;

use crate::StdResult;
use crate::config::{AuthScheme, TesterConfig};
use crate::entities::{HttpMethod, HttpResponseRecord, ResponseBody};

/// Error raised when a request could not complete.
///
/// HTTP error statuses are not executor errors: a 4xx or 5xx response is a
/// contract observation and comes back as a normal [HttpResponseRecord].
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The request exceeded the configured timeout
    #[error("request to '{url}' timed out")]
    Timeout {
        /// Requested URL
        url: String,
    },

    /// The server could not be reached
    #[error("connection to '{url}' refused or unreachable")]
    ConnectionRefused {
        /// Requested URL
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// Any other transport failure
    #[error("transport failure for '{url}'")]
    Transport {
        /// Requested URL
        url: String,
        /// Underlying error
        #[source]
        source: crate::StdError,
    },
}

impl ExecutorError {
    fn from_reqwest(url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ExecutorError::Timeout {
                url: url.to_string(),
            }
        } else if source.is_connect() {
            ExecutorError::ConnectionRefused {
                url: url.to_string(),
                source,
            }
        } else {
            ExecutorError::Transport {
                url: url.to_string(),
                source: anyhow::anyhow!(source),
            }
        }
    }

    fn is_transient(&self) -> bool {
        matches!(
            self,
            ExecutorError::Timeout { .. } | ExecutorError::ConnectionRefused { .. }
        )
    }
}

/// Policy for retrying requests that failed for transport reasons or came
/// back with a gateway error status (502/503/504).
///
/// 4xx and 500 responses are never retried: they are contract or application
/// failures that must be reported, not masked.
#[derive(Debug, Clone)]
pub struct RequestRetryPolicy {
    /// Number of retries after the initial attempt
    pub max_retries: usize,

    /// Delay before the first retry, doubled after each one
    pub initial_delay: Duration,
}

impl RequestRetryPolicy {
    /// A policy that never retries.
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
        }
    }

    fn delay_before_retry(&self, retry_index: usize) -> Duration {
        self.initial_delay * 2u32.saturating_pow(retry_index as u32)
    }
}

impl Default for RequestRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
        }
    }
}

/// Issues HTTP requests against the API under test.
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: Url,
    auth: AuthScheme,
    request_timeout: Duration,
    retry_policy: RequestRetryPolicy,
    logger: Logger,
}

impl HttpExecutor {
    /// Build an executor from the run configuration.
    pub fn new(config: &TesterConfig, logger: &Logger) -> StdResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base url: '{}'", config.base_url))?;
        // Trailing slash is significant because url::join
        // (https://docs.rs/url/latest/url/struct.Url.html#method.join) will remove
        // the 'path' part of the url if it doesn't end with a trailing slash.
        let base_url = if base_url.as_str().ends_with('/') {
            base_url
        } else {
            let mut url = base_url.clone();
            url.set_path(&format!("{}/", base_url.path()));
            url
        };
        let client = reqwest::ClientBuilder::new()
            .build()
            .with_context(|| "Building http client failed")?;

        Ok(Self {
            client,
            base_url,
            auth: config.auth.clone(),
            request_timeout: config.request_timeout,
            retry_policy: RequestRetryPolicy {
                max_retries: config.max_retries,
                initial_delay: config.retry_delay,
            },
            logger: logger.clone(),
        })
    }

    /// Issue one request, retrying transient failures per the policy, and
    /// normalize the response.
    pub async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<HttpResponseRecord, ExecutorError> {
        let url = self.join_url(path)?;

        let mut retry_index = 0;
        loop {
            let started = Instant::now();
            let outcome = self.execute_once(method, &url, body).await;
            let retryable = match &outcome {
                Ok(response) => is_gateway_error(response.status()),
                Err(error) => error.is_transient(),
            };

            if retryable && retry_index < self.retry_policy.max_retries {
                let delay = self.retry_policy.delay_before_retry(retry_index);
                warn!(
                    self.logger, "Transient failure, will retry";
                    "method" => %method, "url" => %url, "retry_index" => retry_index,
                    "delay_ms" => delay.as_millis() as u64,
                );
                retry_index += 1;
                tokio::time::sleep(delay).await;
                continue;
            }

            return match outcome {
                Ok(response) => self.normalize(response, started).await,
                Err(error) => Err(error),
            };
        }
    }

    /// Preflight GET on the base URL, checking reachability and credential
    /// acceptance before lifecycles start.
    pub async fn check_connection(&self) -> StdResult<u16> {
        let response = self
            .apply_auth(self.client.get(self.base_url.clone()))
            .timeout(self.request_timeout)
            .send()
            .await
            .with_context(|| format!("API unreachable at '{}'", self.base_url))?;
        let status = response.status().as_u16();
        debug!(self.logger, "Connection preflight"; "status" => status);

        Ok(status)
    }

    async fn execute_once(
        &self,
        method: HttpMethod,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Response, ExecutorError> {
        let mut request_builder = match method {
            HttpMethod::Get => self.client.get(url.clone()),
            HttpMethod::Post => self.client.post(url.clone()),
            HttpMethod::Put => self.client.put(url.clone()),
            HttpMethod::Patch => self.client.patch(url.clone()),
            HttpMethod::Delete => self.client.delete(url.clone()),
        };
        request_builder = self
            .apply_auth(request_builder)
            .header("accept", "application/json")
            .timeout(self.request_timeout);
        if let Some(body) = body {
            request_builder = request_builder.json(body);
        }

        request_builder
            .send()
            .await
            .map_err(|error| ExecutorError::from_reqwest(url, error))
    }

    async fn normalize(
        &self,
        response: Response,
        started: Instant,
    ) -> Result<HttpResponseRecord, ExecutorError> {
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get("location")
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let url = response.url().clone();
        let text = response
            .text()
            .await
            .map_err(|error| ExecutorError::from_reqwest(&url, error))?;
        let elapsed = started.elapsed();

        let body = if text.is_empty() {
            ResponseBody::Empty
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => ResponseBody::Json(value),
                Err(_) => ResponseBody::Text(text),
            }
        };

        Ok(HttpResponseRecord {
            status,
            body,
            location,
            elapsed,
        })
    }

    fn apply_auth(&self, request_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            AuthScheme::None => request_builder,
            AuthScheme::Basic { username, password } => {
                request_builder.basic_auth(username, Some(password))
            }
            AuthScheme::Bearer { token } => request_builder.bearer_auth(token),
        }
    }

    fn join_url(&self, path: &str) -> Result<Url, ExecutorError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|error| ExecutorError::Transport {
                url: format!("{}{}", self.base_url, path),
                source: anyhow::anyhow!(error).context("Invalid url when joining path to base url"),
            })
    }
}

fn is_gateway_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 502 | 503 | 504)
}
