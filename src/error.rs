//! Error taxonomy shared by every loader.
//!
//! Most variants are recoverable: loaders collect them as warnings next to
//! the records they did manage to produce. Only input I/O failures and
//! [`LoaderError::IterationLimitExceeded`] abort a batch.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    /// A UZA name without exactly one `", "` between city and state parts.
    #[error("malformed UZA name '{name}': expected exactly one \", \" separator, found {separators}")]
    MalformedName { name: String, separators: usize },

    /// A merged group left out of the result, with every UZA it contained.
    #[error("dropped group [{}]: {source}", .members.join("; "))]
    GroupDropped {
        members: Vec<String>,
        source: Box<LoaderError>,
    },

    /// A record refers to an agency that the agency table does not contain.
    #[error("{table} references agency '{agency_id}' which does not exist")]
    UnknownReference { table: String, agency_id: String },

    /// The pairwise merge did not reach a fixed point in time.
    #[error("group merge did not converge within {max_passes} passes")]
    IterationLimitExceeded { max_passes: usize },

    #[error("malformed record{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    MalformedRecord { line: Option<u64>, message: String },

    #[error("invalid {field} value '{value}' for {record}")]
    InvalidValue {
        field: String,
        value: String,
        record: String,
    },

    #[error("{record} has no {field}")]
    MissingField { record: String, field: String },

    #[error("unmatched {kind} '{value}'")]
    UnmatchedRegion { kind: String, value: String },

    #[error("geometry error for {record}: {message}")]
    Geometry { record: String, message: String },

    /// The dashboard answered a create call with something other than success.
    #[error("{endpoint} rejected {record}: {reason}")]
    Rejected {
        endpoint: String,
        record: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Shapefile(#[from] shapefile::Error),
}

impl LoaderError {
    /// Whether the batch can carry on past this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            LoaderError::IterationLimitExceeded { .. }
                | LoaderError::Io(_)
                | LoaderError::Csv(_)
                | LoaderError::Json(_)
                | LoaderError::Http(_)
                | LoaderError::Url(_)
                | LoaderError::Shapefile(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;
