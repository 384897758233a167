//! Area computation for normalized geometries.
//!
//! Converts through `geojson` into `geo` types and uses
//! [`ChamberlainDuquetteArea`], which treats coordinates as WGS84
//! longitude/latitude and returns square meters.

use geo::ChamberlainDuquetteArea;
use geojson::GeoJson;

use crate::Geometry;

/// Returns the unsigned area of an areal geometry in square meters.
///
/// Returns `None` for non-areal kinds and for coordinates that cannot be
/// converted into `geo` types.
#[must_use]
pub fn area_sq_meters(geometry: &Geometry) -> Option<f64> {
    if !geometry.kind().is_areal() {
        return None;
    }

    let geojson = GeoJson::from_json_value(geometry.as_value().clone()).ok()?;
    if let GeoJson::Geometry(geom) = geojson {
        let geo_geom: geo::Geometry<f64> = geom.try_into().ok()?;
        Some(geo_geom.chamberlain_duquette_unsigned_area())
    } else {
        None
    }
}

/// Returns `true` if an areal geometry encloses no area or has
/// unreadable coordinates.
///
/// Non-areal kinds are never considered degenerate.
#[must_use]
pub fn is_degenerate(geometry: &Geometry) -> bool {
    if !geometry.kind().is_areal() {
        return false;
    }
    area_sq_meters(geometry).is_none_or(|area| area <= 0.0)
}
