//! Error taxonomy for the boundary API transport.

use std::time::Duration;

use thiserror::Error;

use crate::transport::ApiResponse;

/// Maximum length of a response body echoed into an error message.
const BODY_PREVIEW_LEN: usize = 500;

/// Everything that can go wrong talking to the boundary API.
///
/// Cloneable so a single failure can be both logged and handed back to
/// callers; underlying transport errors are captured as messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, refused
    /// connection, reset).
    #[error("network error: {message}")]
    Network {
        /// Description from the underlying transport.
        message: String,
    },

    /// A single attempt exceeded its deadline.
    #[error("request timed out after {after:?}")]
    Timeout {
        /// The per-attempt deadline that elapsed.
        after: Duration,
    },

    /// HTTP 502, 503 or 504.
    #[error("service unavailable (HTTP {status})")]
    ServiceUnavailable {
        /// The status code received.
        status: u16,
    },

    /// Any other HTTP 5xx.
    #[error("server error (HTTP {status})")]
    Server {
        /// The status code received.
        status: u16,
    },

    /// HTTP 429.
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    /// HTTP 409: a boundary already exists for the site and year.
    #[error("conflict: {message}")]
    Conflict {
        /// Message reported by the backend.
        message: String,
    },

    /// Any other HTTP 4xx.
    #[error("HTTP {status}: {message}")]
    Client {
        /// The status code received.
        status: u16,
        /// Message reported by the backend.
        message: String,
    },

    /// A 2xx body in none of the recognized shapes.
    #[error("malformed response: {message}")]
    MalformedResponse {
        /// What was wrong with the body.
        message: String,
    },

    /// A 2xx body that was an empty object, meaning the backend has not
    /// finished starting up.
    #[error("backend not ready: received an empty response object")]
    BackendNotReady,

    /// A 2xx `{success: false}` envelope.
    #[error("backend reported failure: {message}")]
    Backend {
        /// Message from the envelope.
        message: String,
    },

    /// A request body could not be encoded.
    #[error("could not encode request: {message}")]
    Encode {
        /// Encoder message.
        message: String,
    },

    /// The request was short-circuited without touching the network.
    #[error("circuit breaker open for resource '{resource}'")]
    CircuitOpen {
        /// Logical resource whose breaker is open.
        resource: String,
    },
}

impl ApiError {
    /// Maps a non-success HTTP response to an error.
    ///
    /// Returns `None` for 1xx, 2xx and 3xx responses.
    #[must_use]
    pub fn from_response(response: &ApiResponse) -> Option<Self> {
        let status = response.status;
        match status {
            409 => Some(Self::Conflict {
                message: body_message(&response.body)
                    .unwrap_or_else(|| "a boundary already exists".to_string()),
            }),
            429 => Some(Self::RateLimited),
            502..=504 => Some(Self::ServiceUnavailable { status }),
            500..=599 => Some(Self::Server { status }),
            400..=499 => Some(Self::Client {
                status,
                message: body_message(&response.body).unwrap_or_else(|| "request rejected".into()),
            }),
            _ => None,
        }
    }

    /// Returns `true` if the transport layer should try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::ServiceUnavailable { .. } | Self::RateLimited
        )
    }

    /// Returns `true` if the failure says something about the backend's
    /// health and should feed its circuit breaker.
    #[must_use]
    pub const fn counts_against_breaker(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Timeout { .. }
                | Self::ServiceUnavailable { .. }
                | Self::Server { .. }
                | Self::RateLimited
                | Self::BackendNotReady
        )
    }
}

/// Extracts a human-readable message from an error body.
///
/// Prefers the `error` or `message` field of a JSON object and falls back
/// to a truncated copy of the raw body.
pub(crate) fn body_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["error", "message"] {
            if let Some(text) = map.get(key).and_then(serde_json::Value::as_str) {
                return Some(text.to_string());
            }
        }
    }

    Some(preview(trimmed))
}

/// Truncates a body for inclusion in logs and error messages.
pub(crate) fn preview(body: &str) -> String {
    if body.chars().count() > BODY_PREVIEW_LEN {
        let head: String = body.chars().take(BODY_PREVIEW_LEN).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn classifies_statuses() {
        assert_eq!(ApiError::from_response(&response(200, "[]")), None);
        assert_eq!(ApiError::from_response(&response(201, "{}")), None);
        assert_eq!(
            ApiError::from_response(&response(429, "")),
            Some(ApiError::RateLimited)
        );
        for status in [502, 503, 504] {
            assert_eq!(
                ApiError::from_response(&response(status, "")),
                Some(ApiError::ServiceUnavailable { status })
            );
        }
        assert_eq!(
            ApiError::from_response(&response(500, "")),
            Some(ApiError::Server { status: 500 })
        );
        assert_eq!(
            ApiError::from_response(&response(404, r#"{"error":"no such boundary"}"#)),
            Some(ApiError::Client {
                status: 404,
                message: "no such boundary".to_string()
            })
        );
    }

    #[test]
    fn conflict_carries_backend_message() {
        let error = ApiError::from_response(&response(409, r#"{"message":"exists for 7/2024"}"#));
        assert_eq!(
            error,
            Some(ApiError::Conflict {
                message: "exists for 7/2024".to_string()
            })
        );
    }

    #[test]
    fn retry_and_breaker_classification() {
        assert!(ApiError::RateLimited.is_retryable());
        assert!(ApiError::ServiceUnavailable { status: 503 }.is_retryable());
        assert!(!ApiError::Server { status: 500 }.is_retryable());
        assert!(!ApiError::Conflict { message: String::new() }.is_retryable());
        assert!(!ApiError::BackendNotReady.is_retryable());

        assert!(ApiError::Server { status: 500 }.counts_against_breaker());
        assert!(ApiError::BackendNotReady.counts_against_breaker());
        assert!(
            !ApiError::Client {
                status: 400,
                message: String::new()
            }
            .counts_against_breaker()
        );
        assert!(!ApiError::MalformedResponse { message: String::new() }.counts_against_breaker());
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(BODY_PREVIEW_LEN * 2);
        let message = body_message(&body).unwrap();
        assert_eq!(message.len(), BODY_PREVIEW_LEN + 3);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn circuit_open_message_names_the_breaker() {
        let message = ApiError::CircuitOpen {
            resource: "vectors".to_string(),
        }
        .to_string();
        assert!(message.contains("circuit breaker"));
    }
}
