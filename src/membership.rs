//! Agency → urbanized-area membership, read from the NTD `Agency_UZAs` table.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{LoaderError, Result};
use crate::table::{Row, read_rows, read_rows_from_path};

/// UZA name used by the NTD for agencies outside any urbanized area.
pub const NON_UZA: &str = "Non-UZA";

const TABLE: &str = "Agency_UZAs";

/// The UZA names of one agency that has at least two of them.
pub type CandidateSet = IndexSet<String>;

#[derive(Debug, Deserialize)]
struct UzaRow {
    #[serde(rename = "Trs_Id")]
    trs_id: String,
    #[serde(rename = "UZA_Name")]
    uza_name: String,
}

/// For every agency, the UZA names it serves in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct AgencyMembership {
    agencies: IndexMap<String, IndexSet<String>>,
    uza_names: IndexSet<String>,
}

impl AgencyMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `agency_id` serves `uza_name`.
    ///
    /// Returns `false` if the pair was already known.
    pub fn insert(&mut self, agency_id: &str, uza_name: &str) -> bool {
        self.uza_names.insert(uza_name.to_string());
        self.agencies
            .entry(agency_id.to_string())
            .or_default()
            .insert(uza_name.to_string())
    }

    pub fn len(&self) -> usize {
        self.agencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agencies.is_empty()
    }

    pub fn get(&self, agency_id: &str) -> Option<&IndexSet<String>> {
        self.agencies.get(agency_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexSet<String>)> {
        self.agencies.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every distinct UZA name, in the order it was first seen.
    pub fn uza_names(&self) -> &IndexSet<String> {
        &self.uza_names
    }

    /// The UZA sets of agencies serving two or more areas, in agency order.
    ///
    /// Agencies with a single UZA cannot link anything and are left out.
    pub fn candidate_sets(&self) -> Vec<CandidateSet> {
        self.agencies
            .values()
            .filter(|uzas| uzas.len() >= 2)
            .cloned()
            .collect()
    }
}

impl<A, U> FromIterator<(A, U)> for AgencyMembership
where
    A: AsRef<str>,
    U: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (A, U)>>(iter: I) -> Self {
        let mut membership = AgencyMembership::new();
        for (agency, uza) in iter {
            membership.insert(agency.as_ref(), uza.as_ref());
        }
        membership
    }
}

/// Output of [`extract`]: the membership plus every record that was skipped.
#[derive(Debug, Default)]
pub struct Extraction {
    pub membership: AgencyMembership,
    pub warnings: Vec<LoaderError>,
}

/// Builds an [`AgencyMembership`] from an `Agency_UZAs` CSV.
///
/// `Non-UZA` rows are dropped. When `known_agencies` is given, rows naming an
/// agency outside it are reported as [`LoaderError::UnknownReference`] and
/// skipped.
pub fn extract<R: Read>(reader: R, known_agencies: Option<&HashSet<String>>) -> Result<Extraction> {
    let mut warnings = Vec::new();
    let rows = read_rows(reader, TABLE, &["Trs_Id", "UZA_Name"], &mut warnings)?;
    Ok(collect_rows(rows, known_agencies, warnings))
}

/// Like [`extract`], reading from a file that is closed before returning.
pub fn extract_from_path(
    path: &Path,
    known_agencies: Option<&HashSet<String>>,
) -> Result<Extraction> {
    let mut warnings = Vec::new();
    let rows = read_rows_from_path(path, TABLE, &["Trs_Id", "UZA_Name"], &mut warnings)?;
    Ok(collect_rows(rows, known_agencies, warnings))
}

fn collect_rows(
    rows: Vec<Row<UzaRow>>,
    known_agencies: Option<&HashSet<String>>,
    mut warnings: Vec<LoaderError>,
) -> Extraction {
    let mut membership = AgencyMembership::new();
    let mut non_uza = 0usize;

    for Row { line, value: row } in rows {
        if row.uza_name == NON_UZA {
            non_uza += 1;
            continue;
        }

        if row.trs_id.is_empty() || row.uza_name.is_empty() {
            warn!(line, trs_id = %row.trs_id, uza_name = %row.uza_name, "Empty agency id or UZA name");
            warnings.push(LoaderError::MalformedRecord {
                line,
                message: format!(
                    "empty Trs_Id or UZA_Name (Trs_Id='{}', UZA_Name='{}')",
                    row.trs_id, row.uza_name
                ),
            });
            continue;
        }

        if let Some(known) = known_agencies {
            if !known.contains(&row.trs_id) {
                warn!(line, trs_id = %row.trs_id, "TRS ID referenced in UZAs table but does not exist");
                warnings.push(LoaderError::UnknownReference {
                    table: TABLE.to_string(),
                    agency_id: row.trs_id,
                });
                continue;
            }
        }

        if !membership.insert(&row.trs_id, &row.uza_name) {
            debug!(line, trs_id = %row.trs_id, uza_name = %row.uza_name, "Duplicate membership");
        }
    }

    info!(
        agencies = membership.len(),
        uzas = membership.uza_names().len(),
        non_uza,
        skipped = warnings.len(),
        "Membership extracted"
    );

    Extraction {
        membership,
        warnings,
    }
}
