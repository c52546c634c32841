use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown circuit element: {0}")]
    UnknownCircuitElement(String),

    #[error("circuit element already defined: {0}")]
    DuplicateElement(String),

    #[error("spice model not found: {0}")]
    SpiceModelNotFound(String),

    #[error("library path is not a directory: {}", .0.display())]
    LibraryPath(PathBuf),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("ngspice error: {0}")]
    Ngspice(String),

    #[error("ngspice not found: {0}")]
    NgspiceNotFound(String),

    #[error("ngspice timed out after {0} seconds")]
    NgspiceTimeout(u64),

    #[error("failed to parse rawfile: {0}")]
    Rawfile(String),

    #[error("analysis mismatch: expected {expected}, got {actual}")]
    AnalysisMismatch { expected: String, actual: String },

    #[error("vector not found: {0}")]
    MissingVector(String),

    #[error("unknown demo: {0}")]
    UnknownDemo(String),

    #[error("plot error: {0}")]
    Plot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
