//! HTTP transport abstraction.
//!
//! The resilient client only needs "send this request, give me a status
//! and a body". Keeping that behind [`HttpTransport`] lets the retry and
//! circuit breaker logic run unchanged against `reqwest` in production
//! and against an in-memory backend in tests.

use async_trait::async_trait;
use strum_macros::{AsRefStr, Display};

use crate::ApiError;
use crate::config::ApiConfig;

/// HTTP methods used by the boundary API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PATCH`
    Patch,
}

/// A request relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the base URL (e.g. `/vectors`).
    pub path: String,
    /// Query string parameters.
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Builds a `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Builds a `POST` request with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// Builds a `PATCH` request with a JSON body.
    #[must_use]
    pub fn patch(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// Appends query parameters.
    #[must_use]
    pub fn with_query(mut self, params: &[(&str, String)]) -> Self {
        self.query
            .extend(params.iter().map(|(k, v)| ((*k).to_string(), v.clone())));
        self
    }

    /// Returns the value of a query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// Sends a single HTTP request with no retry or timeout of its own.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request and returns whatever status the server answered
    /// with. Only failures to obtain a response are errors.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if no response was received.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    auth: Option<(String, String)>,
}

impl ReqwestTransport {
    /// Creates a transport for the given base URL.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: None,
        }
    }

    /// Creates a transport from the `[api]` configuration section.
    #[must_use]
    pub fn from_config(config: &ApiConfig) -> Self {
        let transport = Self::new(reqwest::Client::new(), &config.base_url);
        match &config.auth_token {
            Some(token) => transport.with_auth(&config.auth_header, token),
            None => transport,
        }
    }

    /// Attaches an application-supplied auth header to every request.
    ///
    /// The value is sent verbatim.
    #[must_use]
    pub fn with_auth(mut self, header: &str, value: &str) -> Self {
        self.auth = Some((header.to_string(), value.to_string()));
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn build(&self, request: &ApiRequest) -> reqwest::RequestBuilder {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Patch => self.client.patch(&url),
        };

        builder = builder
            .query(&request.query)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some((name, value)) = &self.auth {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let builder = self.build(request);
        let response = builder.send().await.map_err(|e| ApiError::Network {
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ApiError::Network {
            message: format!("failed to read response body: {e}"),
        })?;

        log::trace!("{} {} -> {status}", request.method, request.path);

        Ok(ApiResponse { status, body })
    }
}
