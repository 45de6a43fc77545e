use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum HindexError {
    #[error("{0}")]
    Error(String),
    #[error("Cannot resolve the {role} coordinate from dimensions {candidates:?}")]
    AmbiguousCoordinate {
        role: String,
        candidates: Vec<String>,
    },
    #[error("Unrecognised index '{0}'")]
    UnknownIndex(String),
    #[error("Cannot regrid from {source_grid} onto {target_grid}: {reason}")]
    RegridIncompatibleGrid {
        source_grid: String,
        target_grid: String,
        reason: String,
    },
    #[error("No complete seasons with lead time between {start} and {end} (available lead times: {available:?})")]
    InsufficientLeadYears {
        start: i32,
        end: i32,
        available: Vec<i32>,
    },
    #[error("Box {0} does not contain any grid cells")]
    EmptySelection(String),
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Invalid season '{0}'")]
    InvalidSeason(String),
    #[error("Unsupported calendar '{0}'")]
    InvalidCalendar(String),
    #[error("Cannot parse time units '{0}'")]
    InvalidTimeUnits(String),
    #[error("Cannot parse simulation identity from filename '{filename}': {reason}")]
    FilenameParse { filename: String, reason: String },
    #[error("Expected exactly one input matching '{pattern}', found {matches}")]
    FileDiscovery { pattern: String, matches: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience type for `Result<T, HindexError>`.
pub type HindexResult<T> = Result<T, HindexError>;
