//! Collapses heterogeneous `GeoJSON` shapes into a canonical [`Geometry`].
//!
//! Accepts a bare geometry, a `Feature` wrapping one, or a
//! `FeatureCollection` (whose first feature is used). Anything else is
//! reported as `None` so callers can skip-and-log instead of failing a
//! whole batch.

use crate::Geometry;

/// Normalizes an arbitrary JSON value into a canonical geometry.
///
/// Returns `None` for empty collections, features without geometry, and
/// unknown shapes. Never panics on malformed input.
#[must_use]
pub fn normalize(input: &serde_json::Value) -> Option<Geometry> {
    match input.get("type")?.as_str()? {
        "FeatureCollection" => {
            let first = input.get("features")?.as_array()?.first()?;
            normalize(first.get("geometry")?)
        }
        "Feature" => normalize(input.get("geometry")?),
        _ => Geometry::from_value(input.clone()),
    }
}

/// Normalizes a batch of values, skipping (and logging) unusable entries.
#[must_use]
pub fn normalize_all(inputs: &[serde_json::Value]) -> Vec<Geometry> {
    inputs
        .iter()
        .enumerate()
        .filter_map(|(index, input)| {
            let geometry = normalize(input);
            if geometry.is_none() {
                log::warn!("Skipping entry {index}: no usable geometry");
            }
            geometry
        })
        .collect()
}

/// Parses uploaded `GeoJSON` text and normalizes it.
///
/// Returns `None` if the text is not JSON or contains no usable geometry.
#[must_use]
pub fn parse_upload(text: &str) -> Option<Geometry> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Uploaded file is not valid JSON: {e}");
            return None;
        }
    };

    let geometry = normalize(&value);
    if geometry.is_none() {
        log::warn!("Uploaded file contains no usable geometry");
    }
    geometry
}

/// Wraps a geometry in a single-feature `FeatureCollection`.
#[must_use]
pub fn wrap_in_feature_collection(geometry: &Geometry) -> serde_json::Value {
    serde_json::json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": geometry.as_value(),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeometryKind;

    fn square() -> serde_json::Value {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]]
        })
    }

    #[test]
    fn bare_geometry_is_returned_as_is() {
        let geometry = normalize(&square()).unwrap();
        assert_eq!(geometry.as_value(), &square());
        assert_eq!(geometry.kind(), GeometryKind::Polygon);
    }

    #[test]
    fn unwraps_feature() {
        let feature = serde_json::json!({
            "type": "Feature",
            "properties": { "name": "north field" },
            "geometry": square(),
        });
        assert_eq!(normalize(&feature).unwrap().as_value(), &square());
    }

    #[test]
    fn unwraps_first_feature_of_collection() {
        let collection = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {}, "geometry": square() },
                { "type": "Feature", "properties": {}, "geometry": { "type": "Point", "coordinates": [5.0, 5.0] } },
            ],
        });
        assert_eq!(normalize(&collection).unwrap().as_value(), &square());
    }

    #[test]
    fn empty_collection_is_none() {
        let collection = serde_json::json!({ "type": "FeatureCollection", "features": [] });
        assert!(normalize(&collection).is_none());
    }

    #[test]
    fn feature_without_geometry_is_none() {
        let feature = serde_json::json!({ "type": "Feature", "properties": {}, "geometry": null });
        assert!(normalize(&feature).is_none());
    }

    #[test]
    fn garbage_is_none() {
        assert!(normalize(&serde_json::json!(null)).is_none());
        assert!(normalize(&serde_json::json!("Polygon")).is_none());
        assert!(normalize(&serde_json::json!({ "type": 7 })).is_none());
        assert!(normalize(&serde_json::json!({ "type": "GeometryCollection", "geometries": [] })).is_none());
    }

    #[test]
    fn wrapping_then_normalizing_is_stable() {
        let geometry = normalize(&square()).unwrap();
        let wrapped = wrap_in_feature_collection(&geometry);
        assert_eq!(normalize(&wrapped), Some(geometry.clone()));

        let nested = wrap_in_feature_collection(&normalize(&wrapped).unwrap());
        assert_eq!(normalize(&nested), Some(geometry));
    }

    #[test]
    fn batch_skips_unusable_entries() {
        let inputs = vec![
            square(),
            serde_json::json!({ "type": "FeatureCollection", "features": [] }),
            serde_json::json!({ "type": "Feature", "geometry": square() }),
        ];
        assert_eq!(normalize_all(&inputs).len(), 2);
    }

    #[test]
    fn parses_uploaded_text() {
        let text = serde_json::to_string(&serde_json::json!({
            "type": "Feature",
            "properties": {},
            "geometry": square(),
        }))
        .unwrap();
        assert_eq!(parse_upload(&text).unwrap().as_value(), &square());
        assert!(parse_upload("not json").is_none());
        assert!(parse_upload("{}").is_none());
    }
}
