//! GTFS feed metadata from a GTFS Data Exchange dump.
//!
//! The input is a JSON array of `{ "info": {...}, "geom": {...} }` objects.
//! Each entry becomes a [`FeedRecord`] with normalized region codes,
//! ISO 8601 timestamps and an EWKT bounding geometry.

use std::io::Read;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use geojson::PolygonType;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::dashboard::{Form, FormRecord};
use crate::error::{LoaderError, Result};
use crate::geometry::{SRID_WGS84, geojson_multipolygon_to_ewkt};
use crate::regions::RegionTable;

/// Keys that may be absent from `info`; each absence is reported.
const OPTIONAL_KEYS: &[&str] = &[
    "url",
    "country",
    "state",
    "dataexchange_id",
    "dataexchange_url",
    "date_added",
    "date_last_updated",
    "feed_baseurl",
    "license_url",
    "is_official",
    "area",
    "days_to_expiration",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// The date the dump was generated, used as the base for expiration dates.
pub fn default_generated_at() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2012, 7, 15)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct RawFeed {
    info: Map<String, Value>,
    geom: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    coordinates: Vec<PolygonType>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedInfo {
    name: String,
    url: Option<String>,
    country: Option<String>,
    state: Option<String>,
    dataexchange_id: Option<String>,
    dataexchange_url: Option<String>,
    date_added: Option<f64>,
    date_last_updated: Option<f64>,
    feed_baseurl: Option<String>,
    license_url: Option<String>,
    is_official: Option<bool>,
    area: Option<String>,
    days_to_expiration: Option<f64>,
}

/// One feed as sent to the GTFS feed create endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedRecord {
    pub agency_name: String,
    pub agency_url: Option<String>,
    pub country: Option<String>,
    pub data_exchange_id: Option<String>,
    pub data_exchange_url: Option<String>,
    pub date_added: Option<String>,
    pub date_updated: Option<String>,
    pub expiration_date: Option<String>,
    pub feed_base_url: Option<String>,
    pub license_url: Option<String>,
    pub official: Option<bool>,
    pub state: Option<String>,
    pub area_description: Option<String>,
    pub geometry: String,
}

impl FormRecord for FeedRecord {
    fn label(&self) -> String {
        format!("feed {}", self.agency_name)
    }

    fn to_form(&self) -> Form {
        let optional = [
            ("agency_url", &self.agency_url),
            ("country", &self.country),
            ("data_exchange_id", &self.data_exchange_id),
            ("data_exchange_url", &self.data_exchange_url),
            ("date_added", &self.date_added),
            ("date_updated", &self.date_updated),
            ("expiration_date", &self.expiration_date),
            ("feed_base_url", &self.feed_base_url),
            ("license_url", &self.license_url),
        ];

        let mut form = vec![("agency_name".to_string(), self.agency_name.clone())];
        form.extend(
            optional
                .into_iter()
                .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.clone()))),
        );
        if let Some(official) = self.official {
            form.push(("official".to_string(), official.to_string()));
        }
        if let Some(state) = &self.state {
            form.push(("state".to_string(), state.clone()));
        }
        if let Some(area) = &self.area_description {
            form.push(("area_description".to_string(), area.clone()));
        }
        form.push(("geometry".to_string(), self.geometry.clone()));
        form
    }
}

/// Renders epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn to_iso8601(epoch_seconds: f64) -> Option<String> {
    if !epoch_seconds.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp(epoch_seconds.trunc() as i64, 0)
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

/// `generated_at` plus a possibly fractional number of days.
pub fn expiration_date(generated_at: DateTime<Utc>, days: f64) -> Option<String> {
    if !days.is_finite() {
        return None;
    }
    TimeDelta::try_seconds((days * 86_400.0).round() as i64)
        .and_then(|delta| generated_at.checked_add_signed(delta))
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

#[derive(Debug, Default)]
pub struct FeedLoad {
    pub feeds: Vec<FeedRecord>,
    pub warnings: Vec<LoaderError>,
}

/// Reads the whole dump and converts every usable entry.
///
/// Malformed JSON is fatal; a single unusable entry is skipped with a warning.
#[tracing::instrument(skip_all, fields(generated_at = %generated_at))]
pub fn load<R: Read>(reader: R, regions: &RegionTable, generated_at: DateTime<Utc>) -> Result<FeedLoad> {
    let raw: Vec<RawFeed> = serde_json::from_reader(reader)?;
    let mut load = FeedLoad::default();

    for (idx, entry) in raw.into_iter().enumerate() {
        if let Some(feed) = convert(idx, entry, regions, generated_at, &mut load.warnings) {
            load.feeds.push(feed);
        }
    }

    info!(
        feeds = load.feeds.len(),
        warnings = load.warnings.len(),
        "Feed dump loaded"
    );
    Ok(load)
}

fn convert(
    idx: usize,
    entry: RawFeed,
    regions: &RegionTable,
    generated_at: DateTime<Utc>,
    warnings: &mut Vec<LoaderError>,
) -> Option<FeedRecord> {
    let name = entry
        .info
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{idx}"));

    for key in OPTIONAL_KEYS {
        if !entry.info.contains_key(*key) {
            debug!(agency = %name, key, "Agency has no key, leaving it unset");
            warnings.push(LoaderError::MissingField {
                record: format!("agency {name}"),
                field: (*key).to_string(),
            });
        }
    }

    let info: FeedInfo = match serde_json::from_value(Value::Object(entry.info)) {
        Ok(info) => info,
        Err(e) => {
            warn!(agency = %name, error = %e, "Feed info does not deserialize");
            warnings.push(LoaderError::MalformedRecord {
                line: None,
                message: format!("feed {name}: {e}"),
            });
            return None;
        }
    };

    let geometry = match entry.geom {
        Some(geom) => geojson_multipolygon_to_ewkt(SRID_WGS84, geom.coordinates),
        None => Err("no geometry".to_string()),
    };
    let geometry = match geometry {
        Ok(geometry) => geometry,
        Err(message) => {
            warn!(agency = %name, %message, "Skipping feed with unusable geometry");
            warnings.push(LoaderError::Geometry {
                record: format!("feed {name}"),
                message,
            });
            return None;
        }
    };

    let country = info
        .country
        .as_deref()
        .and_then(|c| regions.country_code(c))
        .map(str::to_string);
    let state = info
        .state
        .as_deref()
        .and_then(|s| regions.state_code(s, warnings))
        .map(str::to_string);

    Some(FeedRecord {
        agency_name: info.name,
        agency_url: info.url,
        country,
        data_exchange_id: info.dataexchange_id,
        data_exchange_url: info.dataexchange_url,
        date_added: info.date_added.and_then(to_iso8601),
        date_updated: info.date_last_updated.and_then(to_iso8601),
        expiration_date: info
            .days_to_expiration
            .and_then(|days| expiration_date(generated_at, days)),
        feed_base_url: info.feed_baseurl,
        license_url: info.license_url,
        official: info.is_official,
        state,
        area_description: info.area,
        geometry,
    })
}
