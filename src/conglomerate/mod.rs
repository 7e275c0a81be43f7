//! Conglomerate metro areas: urbanized areas linked by shared agency service.
//!
//! The membership table is reduced to the UZA sets of agencies that serve two
//! or more areas, those sets are merged into disjoint groups, and every group
//! gets a combined display name.

pub mod merge;
pub mod naming;

pub use merge::{MergeOptions, MergeStrategy, MergedGroup, merge_groups};
pub use naming::synthesize_name;

use tracing::{info, warn};

use crate::error::{LoaderError, Result};
use crate::membership::AgencyMembership;

/// One merged group and its synthesized name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conglomerate {
    pub name: String,
    pub members: MergedGroup,
}

#[derive(Debug, Default)]
pub struct ConglomerateReport {
    /// Agencies in the membership table.
    pub agencies: usize,
    /// Agencies serving two or more UZAs.
    pub candidates: usize,
    pub conglomerates: Vec<Conglomerate>,
    /// Inputs that were skipped, in the order they were met.
    pub warnings: Vec<LoaderError>,
}

impl ConglomerateReport {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.conglomerates.iter().map(|c| c.name.as_str())
    }
}

/// Runs merge and naming over a complete membership table.
///
/// A group whose name cannot be synthesized is left out of the result and
/// recorded in the report's warnings together with all of its members. The only fatal error is the pairwise
/// merge running out of passes.
#[tracing::instrument(skip_all, fields(strategy = ?options.strategy))]
pub fn build_report(membership: &AgencyMembership, options: &MergeOptions) -> Result<ConglomerateReport> {
    let candidates = membership.candidate_sets();
    info!(
        agencies = membership.len(),
        candidates = candidates.len(),
        "Merging UZAs of multi-area agencies"
    );

    let groups = merge_groups(&candidates, options)?;

    let mut report = ConglomerateReport {
        agencies: membership.len(),
        candidates: candidates.len(),
        ..Default::default()
    };

    for members in groups {
        match synthesize_name(&members) {
            Ok(name) => report.conglomerates.push(Conglomerate { name, members }),
            Err(e) if e.is_recoverable() => {
                let members: Vec<String> = members.into_iter().collect();
                warn!(error = %e, ?members, "Skipping conglomerate with malformed UZA name");
                report.warnings.push(LoaderError::GroupDropped {
                    members,
                    source: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        conglomerates = report.conglomerates.len(),
        skipped = report.warnings.len(),
        "Conglomerates built"
    );
    Ok(report)
}
