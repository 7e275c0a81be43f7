//! Extended WKT (`SRID=<n>;<wkt>`) for the dashboard's geometry fields.

use geo_types::MultiPolygon;
use geojson::PolygonType;
use wkt::ToWkt;

/// WGS 84, used by feed bounds.
pub const SRID_WGS84: u32 = 4326;
/// NAD 83, used by the census urbanized-area shapefiles.
pub const SRID_NAD83: u32 = 4269;

pub fn to_ewkt(srid: u32, geometry: &MultiPolygon<f64>) -> String {
    format!("SRID={srid};{}", geometry.wkt_string())
}

/// Converts GeoJSON MultiPolygon coordinates to EWKT.
pub fn geojson_multipolygon_to_ewkt(srid: u32, coordinates: Vec<PolygonType>) -> Result<String, String> {
    if coordinates.is_empty() {
        return Err("multipolygon has no polygons".to_string());
    }
    let short = coordinates
        .iter()
        .flatten()
        .flatten()
        .find(|position| position.len() < 2);
    if let Some(position) = short {
        return Err(format!("position {position:?} has fewer than two ordinates"));
    }

    let value = geojson::Value::MultiPolygon(coordinates);
    let geometry: MultiPolygon<f64> = value
        .try_into()
        .map_err(|e: geojson::Error| format!("failed to convert GeoJSON: {e}"))?;
    Ok(to_ewkt(srid, &geometry))
}
