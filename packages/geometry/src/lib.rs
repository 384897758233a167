#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `GeoJSON` geometry handling for site boundaries.
//!
//! Boundaries arrive from several places: the drawing surface, uploaded
//! files, and records previously stored by the backend (some of which
//! were mistakenly saved as a `Feature` or `FeatureCollection`). This
//! crate collapses all of those shapes into a single canonical
//! [`Geometry`] value and provides the area computation used to reject
//! degenerate drawings. Area math is delegated to the `geo` crate.

pub mod area;
pub mod normalize;
pub mod serde_lenient;

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use area::{area_sq_meters, is_degenerate};
pub use normalize::{normalize, normalize_all, parse_upload, wrap_in_feature_collection};

/// The six canonical `GeoJSON` geometry types a boundary may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum GeometryKind {
    /// A single position.
    Point,
    /// Several positions.
    MultiPoint,
    /// A connected line.
    LineString,
    /// Several lines.
    MultiLineString,
    /// A polygon with an exterior ring and optional holes.
    Polygon,
    /// Several polygons.
    MultiPolygon,
}

impl GeometryKind {
    /// Returns `true` for kinds that enclose an area.
    #[must_use]
    pub const fn is_areal(self) -> bool {
        matches!(self, Self::Polygon | Self::MultiPolygon)
    }
}

/// A normalized `GeoJSON` geometry.
///
/// Never a `Feature` or `FeatureCollection`; the discriminant is always
/// one of the [`GeometryKind`] variants. The coordinates payload is kept
/// as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Geometry(serde_json::Value);

impl Geometry {
    /// Wraps a bare geometry value, returning `None` unless its `type`
    /// is one of the canonical geometry kinds.
    #[must_use]
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        kind_of(&value)?;
        Some(Self(value))
    }

    /// Returns the geometry's kind.
    #[must_use]
    pub fn kind(&self) -> GeometryKind {
        // The constructor guarantees a canonical type.
        kind_of(&self.0).unwrap_or(GeometryKind::Polygon)
    }

    /// Returns the `coordinates` payload, if present.
    #[must_use]
    pub fn coordinates(&self) -> Option<&serde_json::Value> {
        self.0.get("coordinates")
    }

    /// Borrows the underlying JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Consumes the geometry and returns the underlying JSON value.
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl<'de> Deserialize<'de> for Geometry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        normalize(&value)
            .ok_or_else(|| serde::de::Error::custom("value does not contain a usable geometry"))
    }
}

fn kind_of(value: &serde_json::Value) -> Option<GeometryKind> {
    value.get("type")?.as_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_kinds_only() {
        for kind in [
            "Point",
            "MultiPoint",
            "LineString",
            "MultiLineString",
            "Polygon",
            "MultiPolygon",
        ] {
            let value = serde_json::json!({ "type": kind, "coordinates": [] });
            let geometry = Geometry::from_value(value).unwrap();
            assert_eq!(geometry.kind().as_ref(), kind);
        }

        assert!(Geometry::from_value(serde_json::json!({ "type": "Feature" })).is_none());
        assert!(Geometry::from_value(serde_json::json!({ "type": "Circle" })).is_none());
        assert!(Geometry::from_value(serde_json::json!([1, 2])).is_none());
    }

    #[test]
    fn deserializes_through_normalization() {
        let geometry: Geometry = serde_json::from_value(serde_json::json!({
            "type": "Feature",
            "properties": {},
            "geometry": { "type": "Point", "coordinates": [1.0, 2.0] }
        }))
        .unwrap();
        assert_eq!(geometry.kind(), GeometryKind::Point);

        let garbage: Result<Geometry, _> = serde_json::from_value(serde_json::json!({ "a": 1 }));
        assert!(garbage.is_err());
    }

    #[test]
    fn serializes_transparently() {
        let value = serde_json::json!({ "type": "Point", "coordinates": [1.0, 2.0] });
        let geometry = Geometry::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&geometry).unwrap(), value);
    }
}
