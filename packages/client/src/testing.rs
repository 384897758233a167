//! In-memory boundary API for tests.
//!
//! [`MockBackend`] implements [`HttpTransport`] and behaves like the real
//! `/vectors` service: it enforces one record per `(siteId, year)` by
//! answering `POST` with 409, and filters `GET` by query parameters.
//! Tests can queue scripted replies that take precedence over the
//! simulated service, add latency, and inspect every request received.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::ApiError;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Method};

/// A scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Respond with this status and body.
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Fail without producing a response.
    NetworkError,
    /// Never respond.
    Hang,
}

impl MockReply {
    /// Shorthand for [`MockReply::Status`].
    #[must_use]
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Default)]
struct MockState {
    records: Vec<serde_json::Value>,
    scripted: VecDeque<(Method, String, MockReply)>,
    requests: Vec<ApiRequest>,
    latency: Option<Duration>,
    envelope: bool,
}

/// In-memory stand-in for the boundary API.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record directly, returning its id.
    ///
    /// `geometry` is stored verbatim so tests can seed wrapped shapes.
    pub fn insert(&self, site_id: i64, year: i32, geometry: serde_json::Value) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.lock().records.push(serde_json::json!({
            "id": id,
            "siteId": site_id,
            "year": year,
            "geometry": geometry,
            "properties": {},
        }));
        id
    }

    /// Queues a reply for the next request matching `method` and `path`.
    ///
    /// A `path` ending in `*` matches any request path with that prefix.
    pub fn enqueue(&self, method: Method, path: &str, reply: MockReply) {
        self.lock()
            .scripted
            .push_back((method, path.to_string(), reply));
    }

    /// Delays every reply by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Wraps list and record replies in a `{success, data}` envelope.
    pub fn set_envelope(&self, envelope: bool) {
        self.lock().envelope = envelope;
    }

    /// Returns all stored records.
    #[must_use]
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.lock().records.clone()
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    /// Returns the number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Returns the number of requests with the given method.
    #[must_use]
    pub fn count(&self, method: Method) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_scripted(&self, request: &ApiRequest) -> Option<MockReply> {
        let mut state = self.lock();
        let index = state
            .scripted
            .iter()
            .position(|(method, path, _)| *method == request.method && path_matches(path, &request.path))?;
        state.scripted.remove(index).map(|(_, _, reply)| reply)
    }

    fn respond(&self, request: &ApiRequest) -> ApiResponse {
        let mut state = self.lock();
        let envelope = state.envelope;
        let wrap = |data: serde_json::Value| {
            if envelope {
                serde_json::json!({ "success": true, "data": data })
            } else {
                data
            }
        };

        match (request.method, request.path.as_str()) {
            (Method::Get, "/vectors") => {
                let site = request.query_param("siteId").and_then(|s| s.parse::<i64>().ok());
                let year = request.query_param("year").and_then(|s| s.parse::<i64>().ok());
                let matches: Vec<serde_json::Value> = state
                    .records
                    .iter()
                    .filter(|r| site.is_none_or(|s| r["siteId"].as_i64() == Some(s)))
                    .filter(|r| year.is_none_or(|y| r["year"].as_i64() == Some(y)))
                    .cloned()
                    .collect();
                json_response(200, &wrap(serde_json::Value::Array(matches)))
            }
            (Method::Get, "/api/vector-layers") => {
                let layers: Vec<serde_json::Value> = state
                    .records
                    .iter()
                    .map(|r| {
                        let mut layer = r.clone();
                        layer["site"] = serde_json::json!({
                            "id": r["siteId"],
                            "name": format!("Site {}", r["siteId"]),
                            "category": null,
                        });
                        layer
                    })
                    .collect();
                json_response(200, &wrap(serde_json::Value::Array(layers)))
            }
            (Method::Post, "/vectors") => {
                let body = request.body.clone().unwrap_or_default();
                let site_id = body["siteId"].clone();
                let year = body["year"].clone();
                if site_id.is_null() || year.is_null() {
                    return json_response(400, &serde_json::json!({ "error": "siteId and year are required" }));
                }

                let exists = state
                    .records
                    .iter()
                    .any(|r| r["siteId"] == site_id && r["year"] == year);
                if exists {
                    return json_response(
                        409,
                        &serde_json::json!({
                            "error": format!("boundary already exists for site {site_id} in {year}")
                        }),
                    );
                }

                let record = serde_json::json!({
                    "id": uuid::Uuid::new_v4().to_string(),
                    "siteId": site_id,
                    "year": year,
                    "geometry": body["geometry"],
                    "properties": body.get("properties").cloned().unwrap_or_else(|| serde_json::json!({})),
                });
                state.records.push(record.clone());
                json_response(201, &wrap(record))
            }
            (Method::Patch, path) if path.starts_with("/vectors/") => {
                let id = &path["/vectors/".len()..];
                let body = request.body.clone().unwrap_or_default();
                let Some(record) = state.records.iter_mut().find(|r| r["id"] == id) else {
                    return json_response(404, &serde_json::json!({ "error": format!("no boundary {id}") }));
                };
                if let Some(geometry) = body.get("geometry") {
                    record["geometry"] = geometry.clone();
                }
                if let Some(properties) = body.get("properties") {
                    record["properties"] = properties.clone();
                }
                let record = record.clone();
                json_response(200, &wrap(record))
            }
            _ => json_response(404, &serde_json::json!({ "error": "not found" })),
        }
    }
}

#[async_trait]
impl HttpTransport for MockBackend {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let latency = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match self.take_scripted(request) {
            Some(MockReply::Status { status, body }) => Ok(ApiResponse { status, body }),
            Some(MockReply::NetworkError) => Err(ApiError::Network {
                message: "connection refused".to_string(),
            }),
            Some(MockReply::Hang) => std::future::pending::<Result<ApiResponse, ApiError>>().await,
            None => Ok(self.respond(request)),
        }
    }
}

fn path_matches(pattern: &str, path: &str) -> bool {
    pattern
        .strip_suffix('*')
        .map_or(pattern == path, |prefix| path.starts_with(prefix))
}

fn json_response(status: u16, body: &serde_json::Value) -> ApiResponse {
    ApiResponse {
        status,
        body: body.to_string(),
    }
}
