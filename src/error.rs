use thiserror::Error;

use crate::schedule::types::{DivisionId, TeamId};

/// Errors raised while preparing or controlling a search
#[derive(Debug, Error)]
pub enum SearchError {
    /// A team has no slot on any compatible field under its own wish
    #[error("team {team} ({division}) cannot be placed on any compatible field")]
    InfeasibleTeam { team: String, division: String },

    #[error("no opening match could be generated")]
    NoOpeningMatch,

    #[error("a search is already running, stop it first")]
    AlreadyRunning,

    #[error("field {field}: slot count {slots} must be from 1 to 40")]
    InvalidField { field: u32, slots: i64 },

    #[error("field {field}: game duration must be positive")]
    InvalidFieldDuration { field: u32 },

    #[error("at least one field is required")]
    NoFields,

    #[error("team {team} belongs to unknown division {division}")]
    UnknownDivision { team: TeamId, division: DivisionId },
}

/// Errors raised while reading reference data
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("{path} line {line}: {reason}")]
    Row { path: String, line: u64, reason: String },

    #[error("could not find stadium by id {0}")]
    UnknownStadium(u32),

    #[error("could not find team by id {0}")]
    UnknownTeam(TeamId),
}
