#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Site boundary types shared by the client, cache, and save flow.
//!
//! A boundary is a polygon persisted for one site and one calendar year.
//! The backend is expected to hold at most one non-deleted boundary per
//! `(site_id, year)`; these types mirror its `/vectors` wire format.

use serde::{Deserialize, Deserializer, Serialize};
use site_boundaries_geometry::Geometry;
use strum_macros::{AsRefStr, Display, EnumString};

/// Open key/value properties attached to a boundary.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// A persisted boundary as returned by `GET /vectors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryRecord {
    /// Opaque backend identifier.
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    /// Site the boundary belongs to.
    pub site_id: i64,
    /// Calendar year the boundary applies to.
    pub year: i32,
    /// Normalized geometry, or `None` if the stored shape was unusable.
    #[serde(
        default,
        deserialize_with = "site_boundaries_geometry::serde_lenient::optional_geometry"
    )]
    pub geometry: Option<Geometry>,
    /// Free-form properties (e.g. `{"source": "drawing"}`).
    #[serde(default)]
    pub properties: Properties,
}

impl BoundaryRecord {
    /// Returns `true` if the record belongs to `site_id` in `year`.
    #[must_use]
    pub const fn is_for(&self, site_id: i64, year: i32) -> bool {
        self.site_id == site_id && self.year == year
    }
}

/// Site metadata embedded in a [`VectorLayer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSummary {
    /// Site identifier.
    pub id: i64,
    /// Human-readable site name.
    pub name: String,
    /// Site category, if the backend provides one.
    #[serde(default)]
    pub category: Option<String>,
}

/// A boundary with its site, as returned by `GET /api/vector-layers`.
///
/// Used to paint previously saved boundaries as a read-only background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorLayer {
    /// Opaque backend identifier.
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    /// Site the boundary belongs to.
    pub site_id: i64,
    /// Calendar year the boundary applies to.
    pub year: i32,
    /// Normalized geometry, or `None` if the stored shape was unusable.
    #[serde(
        default,
        deserialize_with = "site_boundaries_geometry::serde_lenient::optional_geometry"
    )]
    pub geometry: Option<Geometry>,
    /// Free-form properties.
    #[serde(default)]
    pub properties: Properties,
    /// The owning site.
    #[serde(default)]
    pub site: Option<SiteSummary>,
}

/// Where a boundary geometry came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BoundarySource {
    /// Drawn by hand on the map.
    Drawing,
    /// Imported from an uploaded `GeoJSON` file.
    Upload,
}

impl BoundarySource {
    /// Builds the properties map stored alongside a boundary.
    #[must_use]
    pub fn properties(self) -> Properties {
        let mut properties = Properties::new();
        properties.insert(
            "source".to_string(),
            serde_json::Value::String(self.to_string()),
        );
        properties
    }
}

/// Body of `POST /vectors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBoundary {
    /// Target site.
    pub site_id: i64,
    /// Target year.
    pub year: i32,
    /// Geometry to persist.
    pub geometry: Geometry,
    /// Properties to persist.
    pub properties: Properties,
}

/// Body of `PATCH /vectors/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryPatch {
    /// Replacement geometry.
    pub geometry: Geometry,
    /// Replacement properties.
    pub properties: Properties,
}

/// A request to persist a drawn or uploaded boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    /// Target site.
    pub site_id: i64,
    /// Target year.
    pub year: i32,
    /// Geometry to persist.
    pub geometry: Geometry,
    /// Where the geometry came from.
    pub source: BoundarySource,
    /// Id of a boundary already known to exist for this site and year.
    pub known_existing_id: Option<String>,
}

impl SaveRequest {
    /// Builds the `POST` body for this request.
    #[must_use]
    pub fn new_boundary(&self) -> NewBoundary {
        NewBoundary {
            site_id: self.site_id,
            year: self.year,
            geometry: self.geometry.clone(),
            properties: self.source.properties(),
        }
    }

    /// Builds the `PATCH` body for this request.
    #[must_use]
    pub fn patch(&self) -> BoundaryPatch {
        BoundaryPatch {
            geometry: self.geometry.clone(),
            properties: self.source.properties(),
        }
    }
}

/// The only results a save can surface to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new boundary was created.
    Created {
        /// Id of the new boundary.
        id: String,
    },
    /// An existing boundary was updated.
    Updated {
        /// Id of the updated boundary.
        id: String,
    },
    /// Nothing was persisted.
    Failed {
        /// Human-readable reason.
        reason: String,
    },
}

impl SaveOutcome {
    /// Returns `true` for [`SaveOutcome::Created`] and [`SaveOutcome::Updated`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Updated { .. })
    }

    /// Returns the persisted boundary id on success.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Created { id } | Self::Updated { id } => Some(id),
            Self::Failed { .. } => None,
        }
    }

    /// Returns the message shown to the operator.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Created { .. } => "Boundary saved".to_string(),
            Self::Updated { .. } => "Boundary updated".to_string(),
            Self::Failed { reason } => format!("Could not save boundary: {reason}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_record_with_wrapped_geometry() {
        let record: BoundaryRecord = serde_json::from_value(serde_json::json!({
            "id": 42,
            "siteId": 7,
            "year": 2024,
            "geometry": {
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": {},
                    "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [0, 1], [1, 1], [0, 0]]] }
                }]
            },
            "properties": { "source": "upload" }
        }))
        .unwrap();

        assert_eq!(record.id, "42");
        assert_eq!(record.site_id, 7);
        assert_eq!(record.year, 2024);
        assert_eq!(
            record.geometry.unwrap().kind(),
            site_boundaries_geometry::GeometryKind::Polygon
        );
        assert_eq!(record.properties["source"], "upload");
    }

    #[test]
    fn decodes_vector_layer_with_site() {
        let layer: VectorLayer = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "siteId": 3,
            "year": 2023,
            "geometry": null,
            "properties": {},
            "site": { "id": 3, "name": "North Marsh", "category": "wetland" }
        }))
        .unwrap();

        assert!(layer.geometry.is_none());
        assert_eq!(layer.site.unwrap().name, "North Marsh");
    }

    #[test]
    fn new_boundary_serializes_camel_case() {
        let request = SaveRequest {
            site_id: 7,
            year: 2024,
            geometry: Geometry::from_value(serde_json::json!({
                "type": "Point",
                "coordinates": [1.0, 2.0]
            }))
            .unwrap(),
            source: BoundarySource::Drawing,
            known_existing_id: None,
        };

        let body = serde_json::to_value(request.new_boundary()).unwrap();
        assert_eq!(body["siteId"], 7);
        assert_eq!(body["year"], 2024);
        assert_eq!(body["geometry"]["type"], "Point");
        assert_eq!(body["properties"]["source"], "drawing");

        let patch = serde_json::to_value(request.patch()).unwrap();
        assert!(patch.get("siteId").is_none());
        assert_eq!(patch["properties"]["source"], "drawing");
    }

    #[test]
    fn outcome_messages_distinguish_verbs() {
        let created = SaveOutcome::Created { id: "1".into() };
        let updated = SaveOutcome::Updated { id: "1".into() };
        let failed = SaveOutcome::Failed {
            reason: "network error".into(),
        };

        assert!(created.is_success() && updated.is_success() && !failed.is_success());
        assert_eq!(created.id(), Some("1"));
        assert_eq!(failed.id(), None);
        assert_ne!(created.user_message(), updated.user_message());
        assert_eq!(updated.user_message(), "Boundary updated");
        assert!(failed.user_message().contains("network error"));
    }

    #[test]
    fn record_matches_only_its_site_and_year() {
        let record: BoundaryRecord = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "siteId": 7,
            "year": 2024,
        }))
        .unwrap();

        assert!(record.is_for(7, 2024));
        assert!(!record.is_for(8, 2024));
        assert!(!record.is_for(7, 2023));
    }
}
