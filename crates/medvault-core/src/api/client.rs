//! API client for communicating with the MedVault REST API.
//!
//! Every request carries the session token as a bearer credential when one
//! is stored. A 401 answer ends the session: the token is cleared and
//! [`SessionEvent::Expired`] is emitted for the presentation layer to act on.
//! There are no retries; each call is at-most-once from the client's side.

use std::time::Duration;

use reqwest::{header, Client, Method, Response, StatusCode, Url};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::auth::{SessionEvent, SessionEvents, SharedTokenStore, TokenStore};
use crate::config::{Config, DEFAULT_REQUEST_TIMEOUT_SECS};

use super::ApiError;

/// Method, JSON body and extra headers of a single request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    /// Applied after the defaults, so `Content-Type` can be overridden here.
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `data` as the JSON body.
    pub fn with_json<B: Serialize + ?Sized>(self, data: &B) -> Result<Self, ApiError> {
        Ok(self.with_body(serde_json::to_value(data)?))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Status and parsed body of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The body on 2xx, a `Status` error carrying the server's message
    /// otherwise.
    pub fn into_result(self) -> Result<Option<Value>, ApiError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(ApiError::from_status(self.status, self.body.as_ref()))
        }
    }
}

/// Parse a response body.
///
/// An empty body is `None`. A body that is not JSON is wrapped as
/// `{"error": <text>}` so callers can always inspect a result.
pub fn parse_body(text: &str) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Response body is not JSON, wrapping as error text");
            Some(json!({ "error": text }))
        }
    }
}

/// API client for the MedVault backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and clones share the token store and event channel.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: SharedTokenStore,
    events: SessionEvents,
}

impl ApiClient {
    /// Create a client for `base_url` with the default timeout.
    pub fn new(
        base_url: impl Into<String>,
        tokens: SharedTokenStore,
        events: SessionEvents,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(
            base_url,
            tokens,
            events,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        tokens: SharedTokenStore,
        events: SessionEvents,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "API client created");

        Ok(Self {
            client,
            base_url,
            tokens,
            events,
        })
    }

    pub fn from_config(
        config: &Config,
        tokens: SharedTokenStore,
        events: SessionEvents,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(
            config.base_url(),
            tokens,
            events,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &SharedTokenStore {
        &self.tokens
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// Absolute URLs are used verbatim, anything else is appended to the
    /// base URL.
    pub fn url_for(&self, path: &str) -> Result<Url, ApiError> {
        let full = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if self.base_url.is_empty() {
            return Err(ApiError::InvalidUrl(format!(
                "{} is relative and no API base URL is configured",
                path
            )));
        } else {
            format!("{}{}", self.base_url, path)
        };

        Url::parse(&full).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", full, e)))
    }

    fn build_headers(&self, extra: &[(String, String)]) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        for (name, value) in extra {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
            let value = header::HeaderValue::from_str(value)
                .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
            headers.insert(name, value);
        }

        if let Some(token) = self.tokens.get() {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidHeader("stored token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Issue a request and return the raw response.
    ///
    /// A 401 clears the token store, emits [`SessionEvent::Expired`] and
    /// fails with [`ApiError::Unauthorized`]. Every other status is returned
    /// to the caller untouched.
    pub async fn send(&self, path: &str, options: RequestOptions) -> Result<Response, ApiError> {
        let url = self.url_for(path)?;
        let headers = self.build_headers(&options.headers)?;

        let mut request = self
            .client
            .request(options.method.clone(), url)
            .headers(headers);
        if let Some(ref body) = options.body {
            request = request.body(serde_json::to_vec(body)?);
        }

        debug!(method = %options.method, path = path, "Sending request");
        let response = request.send().await.map_err(|e| {
            error!(method = %options.method, path = path, error = %e, "Request failed");
            ApiError::Network(e)
        })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let text = response.text().await.unwrap_or_default();
            self.tokens.clear();
            warn!(path = path, "Unauthorized, session token cleared");
            self.events.emit(SessionEvent::Expired);
            return Err(ApiError::Unauthorized {
                body: parse_body(&text),
            });
        }

        debug!(status = %response.status(), path = path, "Response received");
        Ok(response)
    }

    /// Issue a request and parse the body, whatever the status.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<ApiResponse, ApiError> {
        let response = self.send(path, options).await?;
        Self::read(response).await
    }

    /// Issue a request and parse the body; non-2xx statuses become
    /// [`ApiError::Status`].
    pub async fn request_json(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<Value>, ApiError> {
        self.request(path, options).await?.into_result()
    }

    pub async fn read(response: Response) -> Result<ApiResponse, ApiError> {
        let status = response.status();
        let text = response.text().await?;
        Ok(ApiResponse {
            status,
            body: parse_body(&text),
        })
    }

    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.send(path, RequestOptions::new(Method::GET)).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, data: &B) -> Result<Response, ApiError> {
        self.send(path, RequestOptions::new(Method::POST).with_json(data)?)
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, data: &B) -> Result<Response, ApiError> {
        self.send(path, RequestOptions::new(Method::PUT).with_json(data)?)
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, ApiError> {
        self.send(path, RequestOptions::new(Method::DELETE)).await
    }

    pub async fn get_json(&self, path: &str) -> Result<Option<Value>, ApiError> {
        Ok(self.request(path, RequestOptions::new(Method::GET)).await?.body)
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &B,
    ) -> Result<Option<Value>, ApiError> {
        let options = RequestOptions::new(Method::POST).with_json(data)?;
        Ok(self.request(path, options).await?.body)
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &B,
    ) -> Result<Option<Value>, ApiError> {
        let options = RequestOptions::new(Method::PUT).with_json(data)?;
        Ok(self.request(path, options).await?.body)
    }

    pub async fn delete_json(&self, path: &str) -> Result<Option<Value>, ApiError> {
        Ok(self.request(path, RequestOptions::new(Method::DELETE)).await?.body)
    }
}
