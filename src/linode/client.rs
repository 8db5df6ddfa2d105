//! Linode API client implementation.
//!
//! This module provides the HTTP client for the Linode REST API: bearer
//! authentication, structured error decoding, page iteration and retry with
//! exponential backoff bounded by the operation deadline.

use reqwest::{Client, Method, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::ProviderConfig;
use crate::error::{ApiError, ConfigError, ProviderError, Result, is_retryable_status};
use crate::provider::OpContext;

use super::filter::Filter;
use super::types::Page;

/// Results requested per page.
const PAGE_SIZE: u32 = 500;

/// Retry budget for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound of any delay.
    pub max_delay: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), doubling from the minimum.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.min_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            max_attempts: 5,
        }
    }
}

/// Linode API client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct LinodeClient {
    /// HTTP client.
    client: Client,
    /// `{url}/{api_version}` without a trailing slash.
    base_url: String,
    /// API token.
    token: String,
    /// Retry budget.
    retry: RetryPolicy,
}

impl fmt::Debug for LinodeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinodeClient")
            .field("base_url", &self.base_url)
            .field("token", &"(sensitive value)")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Error body returned by the API.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorEntry {
    reason: String,
    #[serde(default)]
    field: Option<String>,
}

/// One request, kept so it can be re-sent on retry.
struct ApiRequest<'a> {
    method: Method,
    path: &'a str,
    query: Vec<(&'static str, String)>,
    filter: Option<String>,
    body: Option<Json>,
}

impl LinodeClient {
    /// Creates a client from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the HTTP client cannot
    /// be created.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let user_agent = match config.ua_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => {
                format!("{prefix} linode-provider/{}", env!("CARGO_PKG_VERSION"))
            }
            _ => format!("linode-provider/{}", env!("CARGO_PKG_VERSION")),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        let base_url = format!(
            "{}/{}",
            config.api_url().trim_end_matches('/'),
            config.api_version().trim_matches('/')
        );

        Ok(Self {
            client,
            base_url,
            token,
            retry: RetryPolicy {
                min_delay: Duration::from_millis(config.min_retry_delay_ms),
                max_delay: Duration::from_millis(config.max_retry_delay_ms),
                max_attempts: config.max_retries.max(1),
            },
        })
    }

    /// Base URL including the API version.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetches one entity.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] on 404, or any other API error.
    pub async fn get<T: DeserializeOwned>(&self, ctx: &OpContext, path: &str) -> Result<T> {
        let json = self.execute(ctx, ApiRequest::new(Method::GET, path)).await?;
        decode(json)
    }

    /// Creates an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    pub async fn post<B, T>(&self, ctx: &OpContext, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::new(Method::POST, path).with_body(body)?;
        decode(self.execute(ctx, request).await?)
    }

    /// Posts an action without a meaningful response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    pub async fn post_action<B>(&self, ctx: &OpContext, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let request = ApiRequest::new(Method::POST, path).with_body(body)?;
        self.execute(ctx, request).await?;
        Ok(())
    }

    /// Updates an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    pub async fn put<B, T>(&self, ctx: &OpContext, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::new(Method::PUT, path).with_body(body)?;
        decode(self.execute(ctx, request).await?)
    }

    /// Deletes an entity.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] on 404, or any other API error.
    pub async fn delete(&self, ctx: &OpContext, path: &str) -> Result<()> {
        self.execute(ctx, ApiRequest::new(Method::DELETE, path)).await?;
        Ok(())
    }

    /// Fetches one page of a list endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the page cannot be decoded.
    pub async fn list_page<T: DeserializeOwned>(
        &self,
        ctx: &OpContext,
        path: &str,
        filter: Option<&Filter>,
        page: u32,
    ) -> Result<Page<T>> {
        let mut request = ApiRequest::new(Method::GET, path);
        request.query.push(("page", page.to_string()));
        request.query.push(("page_size", PAGE_SIZE.to_string()));
        request.filter = filter.filter(|f| !f.is_empty()).map(Filter::encode);
        decode(self.execute(ctx, request).await?)
    }

    /// Fetches every page of a list endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if any page fails.
    pub async fn list<T: DeserializeOwned>(
        &self,
        ctx: &OpContext,
        path: &str,
        filter: Option<&Filter>,
    ) -> Result<Vec<T>> {
        let first: Page<T> = self.list_page(ctx, path, filter, 1).await?;
        let pages = first.pages;
        let mut items = first.data;

        for page in 2..=pages {
            trace!("Fetching page {page} of {pages} for {path}");
            let next: Page<T> = self.list_page(ctx, path, filter, page).await?;
            items.extend(next.data);
        }

        debug!("Listed {} items from {path}", items.len());
        Ok(items)
    }

    /// Executes a request, retrying transient failures.
    async fn execute(&self, ctx: &OpContext, request: ApiRequest<'_>) -> Result<Json> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match ctx
                .run(&format!("{} {}", request.method, request.path), self.execute_once(&request))
                .await
            {
                Ok(json) => return Ok(json),
                Err(ProviderError::Api(e)) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            if attempt >= self.retry.max_attempts {
                warn!("Giving up on {} {} after {attempt} attempts", request.method, request.path);
                return Err(ApiError::Transient {
                    attempts: attempt,
                    message: error.to_string(),
                }
                .into());
            }

            let delay = match error {
                ApiError::RateLimited { retry_after_secs } if retry_after_secs > 0 => {
                    Duration::from_secs(retry_after_secs)
                }
                _ => self.retry.delay_for(attempt),
            };

            if ctx.remaining().is_some_and(|left| left <= delay) {
                return Err(ApiError::Transient {
                    attempts: attempt,
                    message: format!("{error} (deadline reached before next retry)"),
                }
                .into());
            }

            debug!(
                "Retry attempt {attempt} of {} for {} {} in {delay:?}: {error}",
                self.retry.max_attempts, request.method, request.path
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Executes a single request.
    async fn execute_once(&self, request: &ApiRequest<'_>) -> Result<Json> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        trace!("{} {url}", request.method);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(filter) = &request.filter {
            builder = builder.header("X-Filter", filter);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            return Err(ApiError::RateLimited { retry_after_secs }.into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response: {e}")))?;

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                path: request.path.to_string(),
            }
            .into());
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::AuthenticationFailed {
                message: error_message(status, &body),
            }
            .into());
        }

        if !status.is_success() {
            let code = status.as_u16();
            if is_retryable_status(code) {
                debug!("Retryable status {code} from {}", request.path);
            }
            return Err(ApiError::rejected(code, error_message(status, &body)).into());
        }

        if body.trim().is_empty() {
            return Ok(Json::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            ApiError::invalid_response(format!("Failed to parse response: {e}")).into()
        })
    }
}

impl<'a> ApiRequest<'a> {
    const fn new(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            filter: None,
            body: None,
        }
    }

    fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let json = serde_json::to_value(body)
            .map_err(|e| ProviderError::internal(format!("Failed to encode request body: {e}")))?;
        self.body = Some(json);
        Ok(self)
    }
}

/// Decodes a response body into `T`.
fn decode<T: DeserializeOwned>(json: Json) -> Result<T> {
    serde_json::from_value(json)
        .map_err(|e| ApiError::invalid_response(format!("Failed to decode response: {e}")).into())
}

/// Renders the API's `errors[]` body, falling back to the raw text.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if !parsed.errors.is_empty() {
            return parsed
                .errors
                .iter()
                .map(|e| match &e.field {
                    Some(field) => format!("[{field}] {}", e.reason),
                    None => e.reason.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string()
    } else {
        body.trim().to_string()
    }
}
