//! Metro-area records: census urbanized areas and UZA conglomerates.

use std::path::Path;

use geo_types::MultiPolygon;
use shapefile::Shape;
use shapefile::dbase::FieldValue;
use tracing::{info, warn};

use crate::conglomerate::Conglomerate;
use crate::dashboard::{Form, FormRecord};
use crate::error::{LoaderError, Result};
use crate::geometry::{SRID_NAD83, to_ewkt};

const NAME_FIELD: &str = "NAME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetroAreaRecord {
    pub name: String,
    /// EWKT multipolygon, when the area has a known extent.
    pub geometry: Option<String>,
}

impl FormRecord for MetroAreaRecord {
    fn label(&self) -> String {
        format!("metro area {}", self.name)
    }

    fn to_form(&self) -> Form {
        let mut form = vec![("name".to_string(), self.name.clone())];
        if let Some(geometry) = &self.geometry {
            form.push(("geometry".to_string(), geometry.clone()));
        }
        form
    }
}

impl From<&Conglomerate> for MetroAreaRecord {
    fn from(c: &Conglomerate) -> Self {
        Self {
            name: c.name.clone(),
            geometry: None,
        }
    }
}

/// Census names use `--` between cities; the dashboard uses `-`.
pub fn census_name(raw: &str) -> String {
    raw.trim().replace("--", "-")
}

#[derive(Debug, Default)]
pub struct MetroAreaLoad {
    pub areas: Vec<MetroAreaRecord>,
    pub warnings: Vec<LoaderError>,
}

/// Reads every feature of a census urbanized-area shapefile.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_census_shapefile(path: &Path) -> Result<MetroAreaLoad> {
    let rows = shapefile::read(path)?;
    let mut load = MetroAreaLoad::default();

    for (idx, (shape, record)) in rows.into_iter().enumerate() {
        let name = match record.get(NAME_FIELD) {
            Some(FieldValue::Character(Some(s))) if !s.trim().is_empty() => census_name(s),
            _ => {
                warn!(row = idx, "Feature has no NAME");
                load.warnings.push(LoaderError::MissingField {
                    record: format!("shapefile row {idx}"),
                    field: NAME_FIELD.to_string(),
                });
                continue;
            }
        };

        let converted: std::result::Result<MultiPolygon<f64>, String> = match shape {
            Shape::Polygon(polygon) => polygon.try_into().map_err(|e| format!("{e}")),
            Shape::PolygonM(polygon) => polygon.try_into().map_err(|e| format!("{e}")),
            other => Err(format!(
                "unexpected shape type {}, must be polygonal",
                other.shapetype()
            )),
        };

        match converted {
            Ok(geometry) => load.areas.push(MetroAreaRecord {
                name,
                geometry: Some(to_ewkt(SRID_NAD83, &geometry)),
            }),
            Err(message) => {
                warn!(row = idx, %name, %message, "Skipping feature");
                load.warnings.push(LoaderError::Geometry {
                    record: format!("metro area {name}"),
                    message,
                });
            }
        }
    }

    info!(
        areas = load.areas.len(),
        warnings = load.warnings.len(),
        "Census shapefile loaded"
    );
    Ok(load)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_census_name() {
        assert_eq!(
            census_name("Minneapolis--St. Paul, MN--WI "),
            "Minneapolis-St. Paul, MN-WI"
        );
    }

    #[test]
    fn test_conglomerate_form_has_name_only() {
        let conglomerate = Conglomerate {
            name: "Dallas-Fort Worth-Arlington, TX".to_string(),
            members: ["Dallas-Fort Worth-Arlington, TX".to_string()].into_iter().collect(),
        };
        let record = MetroAreaRecord::from(&conglomerate);

        assert_eq!(
            record.to_form(),
            vec![("name".to_string(), "Dallas-Fort Worth-Arlington, TX".to_string())]
        );
    }

    #[test]
    fn test_census_form_has_geometry() {
        let record = MetroAreaRecord {
            name: "Abilene, TX".to_string(),
            geometry: Some("SRID=4269;MULTIPOLYGON(((0 0,1 0,1 1,0 0)))".to_string()),
        };
        let form = record.to_form();
        assert_eq!(form.len(), 2);
        assert_eq!(form[1].0, "geometry");
    }

    #[test]
    fn test_missing_shapefile_is_an_error() {
        let path = std::env::temp_dir().join("dashboard_loader_no_such_file.shp");
        assert!(load_census_shapefile(&path).is_err());
    }
}
