//! HTTP transport to the platform API.
//!
//! [`Transport`] is the seam between the REST client and the network: the
//! client speaks in paths and JSON bodies, the transport adds the base URL,
//! authentication and account headers, and retries transient failures.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use http::{Method, StatusCode, header};
use policy_sdk::PolicyClientError;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProviderConfig;

pub const ACCOUNT_HEADER: &str = "LifeOmic-Account";
pub const USER_HEADER: &str = "LifeOmic-User";

const USER_AGENT: &str = concat!("policyctl/", env!("CARGO_PKG_VERSION"));
const RETRY_BASE_WAIT: Duration = Duration::from_millis(100);

/// Per-request options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Do not send the account header (account-independent endpoints).
    pub omit_account: bool,
}

/// Raw API response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TransportResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request to `path` (relative to the API base URL).
    ///
    /// Error statuses are returned as responses, not errors.
    ///
    /// # Errors
    ///
    /// `Transport` if no response could be obtained.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<TransportResponse, PolicyClientError>;
}

/// [`Transport`] over `reqwest`.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
    account: Option<String>,
    user: Option<String>,
    headers: BTreeMap<String, String>,
    debug: bool,
    max_retries: u32,
    max_retry_wait: Duration,
}

impl HttpTransport {
    /// Build a transport from provider configuration.
    ///
    /// # Errors
    ///
    /// `Transport` if the HTTP client cannot be initialized.
    pub fn new(config: &ProviderConfig) -> Result<Self, PolicyClientError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PolicyClientError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            token: config.token.clone(),
            account: config.account().map(ToOwned::to_owned),
            user: config.user.clone().filter(|u| !u.is_empty()),
            headers: config.headers.clone(),
            debug: config.debug,
            max_retries: config.max_retries,
            max_retry_wait: config.max_retry_wait(),
        })
    }

    fn build(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .request(method, url)
            .header(header::ACCEPT, "application/json");

        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        if !options.omit_account
            && let Some(account) = &self.account
        {
            request = request.header(ACCOUNT_HEADER, account);
        }
        if let Some(user) = &self.user {
            request = request.header(USER_HEADER, user);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request
    }

    /// Exponential backoff capped at the configured maximum wait.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        RETRY_BASE_WAIT.saturating_mul(factor).min(self.max_retry_wait)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<TransportResponse, PolicyClientError> {
        let url = format!("{}{path}", self.base_url);
        if self.debug
            && let Some(body) = body
        {
            debug!(%method, %url, %body, "Request body");
        }

        let mut attempt = 0;
        loop {
            debug!(%method, %url, attempt, "Sending API request");
            match self.build(method.clone(), &url, body, options).send().await {
                Ok(response) if is_retryable(response.status()) && attempt < self.max_retries => {
                    warn!(%method, %url, status = %response.status(), attempt, "Retrying API request");
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| PolicyClientError::transport(e.to_string()))?;
                    debug!(%method, %url, %status, "Received API response");
                    if self.debug {
                        debug!(body = %String::from_utf8_lossy(&body), "Response body");
                    }
                    return Ok(TransportResponse {
                        status,
                        body: body.to_vec(),
                    });
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    warn!(%method, %url, error = %e, attempt, "Retrying API request");
                }
                Err(e) => return Err(PolicyClientError::transport(e.to_string())),
            }

            tokio::time::sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }
}
