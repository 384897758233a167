//! `deserialize_with` helpers for records whose stored geometry may be
//! wrapped or malformed.
//!
//! A single bad geometry should not make a whole list response
//! unreadable, so these yield `None` instead of an error.

use serde::{Deserialize, Deserializer};

use crate::Geometry;

/// Deserializes any JSON value into an optional normalized geometry.
///
/// # Errors
///
/// Only fails if the input is not valid JSON at all.
pub fn optional_geometry<'de, D>(deserializer: D) -> Result<Option<Geometry>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }

    let geometry = crate::normalize(&value);
    if geometry.is_none() {
        log::warn!("Ignoring stored geometry with no usable shape");
    }
    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "optional_geometry")]
        geometry: Option<Geometry>,
    }

    #[test]
    fn tolerates_missing_null_and_garbage() {
        let missing: Holder = serde_json::from_str("{}").unwrap();
        assert!(missing.geometry.is_none());

        let null: Holder = serde_json::from_str(r#"{"geometry":null}"#).unwrap();
        assert!(null.geometry.is_none());

        let garbage: Holder = serde_json::from_str(r#"{"geometry":{"type":"Blob"}}"#).unwrap();
        assert!(garbage.geometry.is_none());

        let wrapped: Holder = serde_json::from_str(
            r#"{"geometry":{"type":"Feature","geometry":{"type":"Point","coordinates":[0,0]}}}"#,
        )
        .unwrap();
        assert!(wrapped.geometry.is_some());
    }
}
