use crate::transport::{TransportError, TransportResult};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently a request is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Fixed wait between attempts
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    /// A policy that never retries
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// A request description that can be sent more than once
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub timeout: Option<Duration>,

    /// Longest wait for the response headers, and for each body chunk of a
    /// streamed download
    pub stall_timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            timeout: None,
            stall_timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = Some(stall_timeout);
        self
    }
}

/// Sends requests with bounded, fixed-delay retry
///
/// Cloning is cheap; the underlying `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct RetryTransport {
    client: Client,
    policy: RetryPolicy,
}

impl RetryTransport {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Returns a transport sharing this client but using another policy
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            client: self.client.clone(),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Sends a request, retrying transport failures
    ///
    /// Returns the first 2xx response. After `max_attempts` failed attempts
    /// the error of the last attempt is returned.
    pub async fn send(&self, spec: &RequestSpec) -> TransportResult<Response> {
        self.with_retry(spec, || self.send_once(spec)).await
    }

    /// Sends a request and reads the body as text
    ///
    /// A body that fails to arrive counts as a failed attempt.
    pub async fn send_text(&self, spec: &RequestSpec) -> TransportResult<String> {
        self.with_retry(spec, || async move {
            let response = self.send_once(spec).await?;
            response
                .text()
                .await
                .map_err(|source| TransportError::Network {
                    url: spec.url.clone(),
                    source,
                })
        })
        .await
    }

    /// Sends a request and decodes the body as JSON
    ///
    /// Decode failures are returned as `TransportError::Decode` and are not
    /// retried.
    pub async fn send_json<T: DeserializeOwned>(&self, spec: &RequestSpec) -> TransportResult<T> {
        let body = self.send_text(spec).await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode {
            url: spec.url.clone(),
            message: e.to_string(),
        })
    }

    async fn with_retry<T, F, Fut>(&self, spec: &RequestSpec, mut operation: F) -> TransportResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        "Request to {} failed ({}), retrying {}/{} after {:?}",
                        spec.url,
                        e,
                        attempt,
                        max_attempts,
                        self.policy.retry_delay
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, spec: &RequestSpec) -> TransportResult<Response> {
        let mut request = self.client.request(spec.method.clone(), spec.url.as_str());

        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = spec.timeout {
            request = request.timeout(timeout);
        }

        let sent = match spec.stall_timeout {
            Some(limit) => tokio::time::timeout(limit, request.send())
                .await
                .map_err(|_| TransportError::Stalled {
                    url: spec.url.clone(),
                    after: limit,
                })?,
            None => request.send().await,
        };
        let response = sent.map_err(|source| TransportError::Network {
            url: spec.url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: spec.url.clone(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}
