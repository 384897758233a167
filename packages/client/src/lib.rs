#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resilient client for the site boundary API.
//!
//! Reads (`GET /vectors`, `GET /api/vector-layers`) pass through a
//! per-resource [`CircuitBreaker`] and a bounded retry loop with
//! exponential backoff and per-attempt timeouts, and never return an
//! error: every failure is reported as a [`ListResult`] with
//! `success == false`. Writes (`POST /vectors`, `PATCH /vectors/{id}`)
//! are single attempts that return a typed [`ApiError`], so the save
//! flow can treat a 409 Conflict as business logic rather than a
//! transport failure.
//!
//! The breaker and retry state are owned by a [`BoundaryClient`]
//! instance. Construct one per session and share it (via `Arc`) with
//! every component that needs the same breaker view of the backend.

pub mod circuit_breaker;
pub mod config;
pub mod envelope;
pub mod error;
pub mod retry;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use site_boundaries_boundary_models::{BoundaryPatch, BoundaryRecord, NewBoundary, VectorLayer};

pub use circuit_breaker::{BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use config::{ClientConfig, ClientConfigError};
pub use error::ApiError;
pub use retry::RetryPolicy;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, ReqwestTransport};

/// Logical resource for boundary records (`/vectors`).
pub const VECTORS: &str = "vectors";

/// Logical resource for the background layer listing (`/api/vector-layers`).
pub const VECTOR_LAYERS: &str = "vector-layers";

/// Outcome of a list fetch. Never an `Err`; failures carry an error
/// and an empty `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListResult<T> {
    /// Whether the fetch succeeded.
    pub success: bool,
    /// Decoded items; empty on failure.
    pub data: Vec<T>,
    /// What went wrong, on failure.
    pub error: Option<ApiError>,
}

impl<T> ListResult<T> {
    /// A successful result.
    #[must_use]
    pub const fn ok(data: Vec<T>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// A failed result.
    #[must_use]
    pub const fn failed(error: ApiError) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            error: Some(error),
        }
    }

    /// Returns the failure as a display string.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Converts into a standard `Result`.
    ///
    /// # Errors
    ///
    /// Returns the captured [`ApiError`] for failed results.
    pub fn into_result(self) -> Result<Vec<T>, ApiError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }
}

/// Client for the boundary API.
pub struct BoundaryClient {
    transport: Arc<dyn HttpTransport>,
    breakers: BreakerRegistry,
    policy: RetryPolicy,
}

impl BoundaryClient {
    /// Creates a client over an arbitrary transport.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            breakers: BreakerRegistry::new(config.breaker),
            policy: config.retry.policy(),
        }
    }

    /// Creates a `reqwest`-backed client from configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(Arc::new(ReqwestTransport::from_config(&config.api)), config)
    }

    /// Returns the shared breaker for a logical resource.
    #[must_use]
    pub fn breaker(&self, resource: &str) -> Arc<CircuitBreaker> {
        self.breakers.get(resource)
    }

    /// Returns the retry policy used for reads.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches and decodes a list from an idempotent `GET` endpoint.
    ///
    /// Short-circuits while `resource`'s breaker is open. A retry-exhausted
    /// failure counts once against the breaker; any success resets it.
    pub async fn fetch_list<T: DeserializeOwned>(
        &self,
        resource: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> ListResult<T> {
        let breaker = self.breakers.get(resource);
        if !breaker.allow_request() {
            log::debug!("Skipping GET {path}: circuit breaker for '{resource}' is open");
            return ListResult::failed(ApiError::CircuitOpen {
                resource: resource.to_string(),
            });
        }

        let request = ApiRequest::get(path).with_query(params);
        let result = match retry::send_with_retry(self.transport.as_ref(), &request, &self.policy)
            .await
        {
            Ok(response) => envelope::decode_list(&response.body),
            Err(error) => Err(error),
        };

        match result {
            Ok(data) => {
                breaker.record_success();
                ListResult::ok(data)
            }
            Err(error) => {
                if error.counts_against_breaker() {
                    breaker.record_failure();
                }
                log::warn!("GET {path} failed: {error}");
                ListResult::failed(error)
            }
        }
    }

    /// Lists every boundary for a year.
    pub async fn list_boundaries(&self, year: i32) -> ListResult<BoundaryRecord> {
        self.fetch_list(VECTORS, "/vectors", &[("year", year.to_string())])
            .await
    }

    /// Lists the boundaries for one site and year (normally zero or one).
    pub async fn find_boundaries(&self, site_id: i64, year: i32) -> ListResult<BoundaryRecord> {
        self.fetch_list(
            VECTORS,
            "/vectors",
            &[("siteId", site_id.to_string()), ("year", year.to_string())],
        )
        .await
    }

    /// Lists all saved boundaries with their sites for the background layer.
    pub async fn list_vector_layers(&self) -> ListResult<VectorLayer> {
        self.fetch_list(VECTOR_LAYERS, "/api/vector-layers", &[])
            .await
    }

    /// Creates a boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Conflict`] if a boundary already exists for the
    /// site and year, or any other transport or decoding error.
    pub async fn create_boundary(&self, boundary: &NewBoundary) -> Result<BoundaryRecord, ApiError> {
        let body = encode(boundary)?;
        self.write(ApiRequest::post("/vectors", body)).await
    }

    /// Replaces a boundary's geometry and properties.
    ///
    /// # Errors
    ///
    /// Returns any transport or decoding error.
    pub async fn update_boundary(
        &self,
        id: &str,
        patch: &BoundaryPatch,
    ) -> Result<BoundaryRecord, ApiError> {
        let body = encode(patch)?;
        self.write(ApiRequest::patch(format!("/vectors/{id}"), body))
            .await
    }

    async fn write(&self, request: ApiRequest) -> Result<BoundaryRecord, ApiError> {
        let response =
            retry::send_once(self.transport.as_ref(), &request, self.policy.attempt_timeout)
                .await?;
        envelope::decode_record(&response.body)
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Encode {
        message: e.to_string(),
    })
}
