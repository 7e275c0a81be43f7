//! Reporting and persistence for conglomerate results.
//!
//! Supports a plain-text report and CSV append.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use serde::Serialize;
use tracing::debug;

use crate::conglomerate::{Conglomerate, ConglomerateReport};
use crate::error::{LoaderError, Result};

const MEMBER_SEPARATOR: &str = "|";

/// One CSV row per conglomerate.
#[derive(Debug, Serialize)]
pub struct ConglomerateRow<'a> {
    pub name: &'a str,
    pub members: String,
    pub member_count: usize,
}

impl<'a> From<&'a Conglomerate> for ConglomerateRow<'a> {
    fn from(c: &'a Conglomerate) -> Self {
        let members: Vec<&str> = c.members.iter().map(String::as_str).collect();
        Self {
            name: &c.name,
            members: members.join(MEMBER_SEPARATOR),
            member_count: c.members.len(),
        }
    }
}

/// Writes the count header, one name per line, then a summary of skipped inputs.
pub fn write_report<W: Write>(out: &mut W, report: &ConglomerateReport) -> Result<()> {
    writeln!(out, "Conglomerate Metro Areas: {}", report.conglomerates.len())?;
    for name in report.names() {
        writeln!(out, "{name}")?;
    }
    write_warnings(out, &report.warnings)?;
    Ok(())
}

/// Writes the trailing `Skipped` block; nothing when there are no warnings.
pub fn write_warnings<W: Write>(out: &mut W, warnings: &[LoaderError]) -> Result<()> {
    if warnings.is_empty() {
        return Ok(());
    }
    writeln!(out, "Skipped {} input(s):", warnings.len())?;
    for warning in warnings {
        writeln!(out, "  {warning}")?;
    }
    Ok(())
}

/// Prints the report to stdout.
pub fn print_report(report: &ConglomerateReport) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    write_report(&mut lock, report)
}

/// Appends one row per conglomerate to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records(path: &Path, conglomerates: &[Conglomerate]) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = conglomerates.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for conglomerate in conglomerates {
        writer.serialize(ConglomerateRow::from(conglomerate))?;
    }
    writer.flush()?;

    Ok(())
}
