//! National Transit Database agencies.
//!
//! Three passes over the NTD tables build one [`NtdAgency`] per transit
//! agency: `Agency_Information` for identity and population, `Service` for
//! annual ridership and passenger miles, and `Agency_UZAs` for the urbanized
//! areas served.

use std::collections::HashSet;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use tracing::{info, warn};

use crate::dashboard::{Form, FormRecord};
use crate::error::{LoaderError, Result};
use crate::membership;
use crate::table::{Row, read_rows_from_path};

const ANNUAL_TOTAL: &str = "Annual Total";

#[derive(Debug, Deserialize)]
struct AgencyInfoRow {
    #[serde(rename = "Trs_Id")]
    trs_id: String,
    #[serde(rename = "Company_Nm")]
    company_name: String,
    #[serde(rename = "Url_Cd")]
    url: String,
    #[serde(rename = "Service_Area_Population")]
    population: String,
}

#[derive(Debug, Deserialize)]
struct AgencyIdRow {
    #[serde(rename = "Trs_Id")]
    trs_id: String,
}

#[derive(Debug, Deserialize)]
struct ServiceRow {
    #[serde(rename = "Trs_Id")]
    trs_id: String,
    #[serde(rename = "Time_Period_Desc")]
    time_period: String,
    #[serde(rename = "Mode_Cd")]
    mode: String,
    #[serde(rename = "Unlinked_Passenger_Trips")]
    unlinked_passenger_trips: String,
    #[serde(rename = "Passenger_Miles")]
    passenger_miles: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NtdAgency {
    pub ntd_id: String,
    pub name: String,
    pub url: String,
    pub population: u64,
    /// Annual unlinked passenger trips summed over modes.
    pub ridership: Option<u64>,
    pub passenger_miles: Option<u64>,
    pub uza_names: IndexSet<String>,
}

impl FormRecord for NtdAgency {
    fn label(&self) -> String {
        format!("agency {} ({})", self.name, self.ntd_id)
    }

    fn to_form(&self) -> Form {
        let mut form = vec![
            ("name".to_string(), self.name.clone()),
            ("url".to_string(), self.url.clone()),
            ("ntdId".to_string(), self.ntd_id.clone()),
            ("population".to_string(), self.population.to_string()),
        ];
        if let Some(ridership) = self.ridership {
            form.push(("ridership".to_string(), ridership.to_string()));
        }
        if let Some(miles) = self.passenger_miles {
            form.push(("passenger_miles".to_string(), miles.to_string()));
        }
        for uza in &self.uza_names {
            form.push(("uzaNames".to_string(), uza.clone()));
        }
        form
    }
}

/// Parses an NTD count such as `"1,204,311"`. Empty or non-numeric text is `None`.
pub fn parse_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Paths of the three NTD tables.
#[derive(Debug, Clone)]
pub struct NtdTables<'a> {
    pub agency_information: &'a Path,
    pub service: &'a Path,
    pub agency_uzas: &'a Path,
}

#[derive(Debug, Default)]
pub struct NtdLoad {
    pub agencies: IndexMap<String, NtdAgency>,
    pub warnings: Vec<LoaderError>,
}

impl NtdLoad {
    /// Agency ids present in the information table.
    pub fn known_ids(&self) -> HashSet<String> {
        self.agencies.keys().cloned().collect()
    }
}

/// Reads only the agency ids of an `Agency_Information` table.
pub fn load_agency_ids(path: &Path, warnings: &mut Vec<LoaderError>) -> Result<HashSet<String>> {
    let rows: Vec<Row<AgencyIdRow>> =
        read_rows_from_path(path, "Agency_Information", &["Trs_Id"], warnings)?;
    let mut ids = HashSet::new();
    for Row { line, value } in rows {
        if value.trs_id.is_empty() {
            warn!(line, "Empty Trs_Id in Agency_Information");
            warnings.push(LoaderError::MalformedRecord {
                line,
                message: "empty Trs_Id in Agency_Information".to_string(),
            });
            continue;
        }
        ids.insert(value.trs_id);
    }
    Ok(ids)
}

/// Runs all three passes.
#[tracing::instrument(skip_all)]
pub fn load(tables: &NtdTables<'_>) -> Result<NtdLoad> {
    let mut load = NtdLoad::default();

    let rows = read_rows_from_path(
        tables.agency_information,
        "Agency_Information",
        &["Trs_Id", "Company_Nm", "Url_Cd", "Service_Area_Population"],
        &mut load.warnings,
    )?;
    add_agencies(&mut load, rows);

    let rows = read_rows_from_path(
        tables.service,
        "Service",
        &[
            "Trs_Id",
            "Time_Period_Desc",
            "Mode_Cd",
            "Unlinked_Passenger_Trips",
            "Passenger_Miles",
        ],
        &mut load.warnings,
    )?;
    add_service(&mut load, rows);

    let extraction = membership::extract_from_path(tables.agency_uzas, Some(&load.known_ids()))?;
    load.warnings.extend(extraction.warnings);
    for (agency_id, uzas) in extraction.membership.iter() {
        if let Some(agency) = load.agencies.get_mut(agency_id) {
            agency.uza_names.extend(uzas.iter().cloned());
        }
    }

    info!(
        agencies = load.agencies.len(),
        warnings = load.warnings.len(),
        "NTD tables loaded"
    );
    Ok(load)
}

fn add_agencies(load: &mut NtdLoad, rows: Vec<Row<AgencyInfoRow>>) {
    for Row { line, value: row } in rows {
        if row.trs_id.is_empty() {
            load.warnings.push(LoaderError::MalformedRecord {
                line,
                message: "empty Trs_Id in Agency_Information".to_string(),
            });
            continue;
        }

        let population = match parse_count(&row.population) {
            Some(p) => p,
            None => {
                warn!(agency = %row.company_name, population = %row.population, "Invalid population");
                load.warnings.push(LoaderError::InvalidValue {
                    field: "population".to_string(),
                    value: row.population.clone(),
                    record: format!("agency {}", row.company_name),
                });
                0
            }
        };

        load.agencies.insert(
            row.trs_id.clone(),
            NtdAgency {
                ntd_id: row.trs_id,
                name: row.company_name,
                url: row.url,
                population,
                ..Default::default()
            },
        );
    }
}

fn add_service(load: &mut NtdLoad, rows: Vec<Row<ServiceRow>>) {
    for Row { value: row, .. } in rows {
        if row.time_period != ANNUAL_TOTAL {
            continue;
        }

        let Some(agency) = load.agencies.get_mut(&row.trs_id) else {
            warn!(trs_id = %row.trs_id, "Service table has nonexistent id");
            load.warnings.push(LoaderError::UnknownReference {
                table: "Service".to_string(),
                agency_id: row.trs_id,
            });
            continue;
        };

        let record = format!("agency {} mode {}", agency.name, row.mode);

        match parse_count(&row.unlinked_passenger_trips) {
            Some(trips) => *agency.ridership.get_or_insert(0) += trips,
            None => {
                warn!(%record, value = %row.unlinked_passenger_trips, "Invalid value for trips");
                load.warnings.push(LoaderError::InvalidValue {
                    field: "trips".to_string(),
                    value: row.unlinked_passenger_trips,
                    record: record.clone(),
                });
            }
        }

        match parse_count(&row.passenger_miles) {
            Some(miles) => *agency.passenger_miles.get_or_insert(0) += miles,
            None => {
                warn!(%record, value = %row.passenger_miles, "Invalid value for miles");
                load.warnings.push(LoaderError::InvalidValue {
                    field: "miles".to_string(),
                    value: row.passenger_miles,
                    record,
                });
            }
        }
    }
}
