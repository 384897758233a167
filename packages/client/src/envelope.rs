//! Decoding of the response shapes the boundary API is known to emit.
//!
//! A successful list response may be a bare array or a
//! `{"success": true, "data": [...]}` envelope. An empty object `{}`
//! comes back while the backend is still warming up; it is reported as
//! [`ApiError::BackendNotReady`] rather than as an empty list, because
//! an empty list would make every site look like it has no boundary.

use serde::de::DeserializeOwned;

use crate::ApiError;
use crate::error::preview;

/// Decodes a list response.
///
/// Items that fail to decode are skipped and logged.
///
/// # Errors
///
/// Returns [`ApiError::BackendNotReady`] for `{}`, [`ApiError::Backend`]
/// for a `{success: false}` envelope, and [`ApiError::MalformedResponse`]
/// for anything else that is not a list.
pub fn decode_list<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, ApiError> {
    let items = match parse(body)? {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => match unwrap_envelope(map)? {
            serde_json::Value::Array(items) => items,
            other => {
                return Err(ApiError::MalformedResponse {
                    message: format!("expected a list in envelope data, got {}", kind(&other)),
                });
            }
        },
        other => {
            return Err(ApiError::MalformedResponse {
                message: format!("expected a list, got {}", kind(&other)),
            });
        }
    };

    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Skipping list item {index}: {e}");
                None
            }
        })
        .collect();

    if decoded.len() < total {
        log::warn!("Decoded {} of {total} list items", decoded.len());
    }

    Ok(decoded)
}

/// Decodes a single-record response (bare object or envelope).
///
/// # Errors
///
/// Same shapes as [`decode_list`], plus [`ApiError::MalformedResponse`]
/// if the record itself does not decode.
pub fn decode_record<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let value = match parse(body)? {
        serde_json::Value::Object(map) => unwrap_envelope(map)?,
        other => other,
    };

    serde_json::from_value(value).map_err(|e| ApiError::MalformedResponse {
        message: format!("could not decode record: {e}"),
    })
}

fn parse(body: &str) -> Result<serde_json::Value, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::MalformedResponse {
        message: format!("invalid JSON ({e}): {}", preview(body)),
    })
}

/// Returns the payload of an object response.
///
/// Objects carrying a `success` flag are envelopes and yield their
/// `data`; any other non-empty object is returned unchanged.
fn unwrap_envelope(
    mut map: serde_json::Map<String, serde_json::Value>,
) -> Result<serde_json::Value, ApiError> {
    if map.is_empty() {
        return Err(ApiError::BackendNotReady);
    }

    let Some(success) = map.get("success") else {
        return Ok(serde_json::Value::Object(map));
    };

    if success.as_bool() != Some(true) {
        let message = ["error", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(serde_json::Value::as_str))
            .unwrap_or("no error message")
            .to_string();
        return Err(ApiError::Backend { message });
    }

    match map.remove("data") {
        Some(serde_json::Value::Null) | None => Err(ApiError::MalformedResponse {
            message: "envelope has no data".to_string(),
        }),
        Some(data) => Ok(data),
    }
}

const fn kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_boundaries_boundary_models::BoundaryRecord;

    const RECORD: &str = r#"{"id":"a1","siteId":7,"year":2024,"geometry":{"type":"Point","coordinates":[0,0]},"properties":{}}"#;

    #[test]
    fn decodes_bare_array() {
        let records: Vec<BoundaryRecord> = decode_list(&format!("[{RECORD}]")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].site_id, 7);
    }

    #[test]
    fn decodes_envelope() {
        let body = format!(r#"{{"success":true,"data":[{RECORD},{RECORD}]}}"#);
        let records: Vec<BoundaryRecord> = decode_list(&body).unwrap();
        assert_eq!(records.len(), 2);

        let empty: Vec<BoundaryRecord> = decode_list(r#"{"success":true,"data":[]}"#).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn empty_object_is_not_an_empty_list() {
        let result = decode_list::<BoundaryRecord>("{}");
        assert_eq!(result, Err(ApiError::BackendNotReady));
    }

    #[test]
    fn failed_envelope_surfaces_message() {
        let result = decode_list::<BoundaryRecord>(r#"{"success":false,"error":"db offline"}"#);
        assert_eq!(
            result,
            Err(ApiError::Backend {
                message: "db offline".to_string()
            })
        );
    }

    #[test]
    fn unrecognized_shapes_are_malformed() {
        for body in ["\"hello\"", "42", "not json", r#"{"rows":[]}"#, r#"{"success":true}"#] {
            let result = decode_list::<BoundaryRecord>(body);
            assert!(
                matches!(result, Err(ApiError::MalformedResponse { .. })),
                "{body} -> {result:?}"
            );
        }
    }

    #[test]
    fn undecodable_items_are_skipped() {
        let body = format!(r#"[{RECORD},{{"id":"broken"}}]"#);
        let records: Vec<BoundaryRecord> = decode_list(&body).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn decodes_single_record_either_way() {
        let bare: BoundaryRecord = decode_record(RECORD).unwrap();
        assert_eq!(bare.id, "a1");

        let wrapped: BoundaryRecord =
            decode_record(&format!(r#"{{"success":true,"data":{RECORD}}}"#)).unwrap();
        assert_eq!(wrapped, bare);

        assert_eq!(
            decode_record::<BoundaryRecord>("{}"),
            Err(ApiError::BackendNotReady)
        );
    }
}
