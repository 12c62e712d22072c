use crate::game::chart::{Lane, TrackPosition};
use std::path::PathBuf;
use thiserror::Error;

/// Load-time failures. Any of these rejects the chart as a whole.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart is missing mandatory field #{field}")]
    MissingField { field: &'static str },

    #[error(
        "unknown cell code {code:?} with previous state {previous} \
         (measure {measure}, row {row}, lane {lane})"
    )]
    UnknownCellCode {
        code: char,
        previous: TrackPosition,
        measure: usize,
        row: usize,
        lane: Lane,
    },

    #[error("grid row has {len} cells, expected 4 (measure {measure}, row {row})")]
    ShortRow { measure: usize, row: usize, len: usize },

    #[error("failed to read chart file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("level index {index} out of range ({available} levels)")]
    InvalidLevelIndex { index: usize, available: usize },
}
