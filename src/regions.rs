//! Country and state name normalization for feed metadata.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{LoaderError, Result};

const COUNTRIES: &[(&str, &str)] = &[("united states", "us"), ("canada", "ca")];

const STATES: &[(&str, &str)] = &[
    ("alabama", "al"),
    ("arizona", "az"),
    ("arkansas", "ar"),
    ("california", "ca"),
    ("colorado", "co"),
    ("connecticut", "ct"),
    ("delaware", "de"),
    ("florida", "fl"),
    ("hawaii", "hi"),
    ("illinois", "il"),
    ("indiana", "in"),
    ("kansas", "ks"),
    ("kentucky", "ky"),
    ("maryland", "md"),
    ("massachusetts", "ma"),
    ("michigan", "mi"),
    ("minnesota", "mn"),
    ("missouri", "mo"),
    ("montana", "mt"),
    ("nevada", "nv"),
    ("new jersey", "nj"),
    ("new york", "ny"),
    ("north carolina", "nc"),
    ("ohio", "oh"),
    ("oregon", "or"),
    ("pennsylvania", "pa"),
    ("south carolina", "sc"),
    ("tennessee", "tn"),
    ("texas", "tx"),
    ("utah", "ut"),
    ("virginia", "va"),
    ("washington", "wa"),
    ("washington dc", "dc"),
    ("wisconsin", "wi"),
];

/// Maps full country and state names to their short codes.
///
/// Stored as a JSON object on disk, keys matched case-insensitively:
/// ```json
/// {
///   "countries": { "United States": "us" },
///   "states": { "New York": "ny" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RegionTable {
    #[serde(default)]
    countries: HashMap<String, String>,
    #[serde(default)]
    states: HashMap<String, String>,
}

impl Default for RegionTable {
    fn default() -> Self {
        let collect = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        Self {
            countries: collect(COUNTRIES),
            states: collect(STATES),
        }
    }
}

impl RegionTable {
    /// Loads a table from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RegionTable = serde_json::from_str(content)?;
        let lower = |map: HashMap<String, String>| {
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect()
        };
        Ok(Self {
            countries: lower(raw.countries),
            states: lower(raw.states),
        })
    }

    /// Code for `country`; `None` for unknown countries.
    pub fn country_code(&self, country: &str) -> Option<&str> {
        self.countries
            .get(&country.to_lowercase())
            .map(String::as_str)
    }

    /// Code for `state`. An unknown state is reported through `warnings`.
    pub fn state_code(&self, state: &str, warnings: &mut Vec<LoaderError>) -> Option<&str> {
        let code = self.states.get(&state.to_lowercase()).map(String::as_str);
        if code.is_none() {
            warn!(state, "Unmatched state");
            warnings.push(LoaderError::UnmatchedRegion {
                kind: "state".to_string(),
                value: state.to_string(),
            });
        }
        code
    }
}
