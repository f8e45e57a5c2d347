//! Error types for burnscar

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for burnscar operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    /// Raster bands do not satisfy the feature schema the scaler or model expects
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Missing CRS, unsupported CRS, or a degenerate extent
    #[error("CRS resolution failed: {0}")]
    CrsResolution(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A classifier or scaler artifact could not be loaded
    #[error("Cannot load artifact {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a decoder/encoder failure as an I/O error so unreadable rasters
    /// and unwritable outputs surface under one kind.
    pub fn invalid_data(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{}: {}", context, err),
        ))
    }

    /// Short label for the error family, used in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SchemaMismatch(_) => "schema-mismatch",
            Error::CrsResolution(_) => "crs-resolution",
            Error::Io(_) | Error::Json(_) => "io",
            Error::Artifact { .. } => "artifact",
            Error::InvalidParameter { .. } => "invalid-parameter",
            _ => "other",
        }
    }
}

/// Result type alias for burnscar operations
pub type Result<T> = std::result::Result<T, Error>;
