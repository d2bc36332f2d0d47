//! Errors raised while validating configuration and deriving namelist parameters.
//!
//! Every variant describes a configuration defect: none of them are transient and none are
//! retried. Each carries enough context (field, domain, expected vs actual) to fix the
//! parameters file without reading this crate.

use {chrono::NaiveDateTime, std::path::PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{name} does not exist: {}", path.display())]
    MissingExecutable { name: &'static str, path: PathBuf },

    #[error("[{section}] {field}: {reason}")]
    Schema {
        section: String,
        field: String,
        reason: String,
    },

    #[error("domain {domain}: {field} is {value}, the number of grid points must be at least {min}")]
    GeometryTooSmall {
        domain: usize,
        field: &'static str,
        value: i64,
        min: i64,
    },

    #[error("domain {domain} has parent_id {parent_id}, which is not in the selected domains {selection:?}; parent/child domains must match")]
    NestingViolation {
        domain: usize,
        parent_id: usize,
        selection: Vec<usize>,
    },

    #[error("{field} has {actual} values, expected {full} (full domain count) or {target} (run domain count)")]
    ArityMismatch {
        field: String,
        actual: usize,
        full: usize,
        target: usize,
    },

    #[error("map projection {kind:?} is not supported here (supported: lambert, mercator, polar)")]
    UnsupportedProjection { kind: String },

    #[error("invalid domain selection {selection:?}: {reason}")]
    InvalidDomainSelection {
        selection: Vec<usize>,
        reason: String,
    },

    #[error("start_date ({start}) is after end_date ({end})")]
    InvalidTimeRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("the summary file requires start_date ({start}) and end_date ({end}) to fall on midnight")]
    SummaryAlignment {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("summary file: {reason} (n_days_per_file = {n_days_per_file}, interval_days = {interval_days}, run length = {run_days} days)")]
    SummaryPeriodMismatch {
        n_days_per_file: i64,
        interval_days: i64,
        run_days: i64,
        reason: &'static str,
    },

    #[error("domain {domain}: history interval of {minutes} minutes does not divide evenly into 24 hours")]
    InvalidHistoryInterval { domain: usize, minutes: i64 },

    #[error("namelist line {line}: {reason}")]
    NamelistSyntax { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn schema<S: Into<String>, F: Into<String>, R: Into<String>>(
        section: S,
        field: F,
        reason: R,
    ) -> Self {
        Error::Schema {
            section: section.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}
