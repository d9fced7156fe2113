//! Error types for grid computations and raster I/O.

use std::path::PathBuf;

use thiserror::Error;

/// Structural problems with a set of grids. Always fatal for the call that
/// raised them; no partial output is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("{what} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("At least one {0} is required")]
    Empty(&'static str),
}

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Only single-sample integer and floating point pages can be read.
    #[error("Unsupported sample format in {0:?}")]
    UnsupportedSampleFormat(PathBuf),

    #[error("Band {band} not found in {path:?} ({available} available)")]
    MissingBand {
        path: PathBuf,
        band: usize,
        available: usize,
    },

    #[error("Nothing to write to {0:?}")]
    NoBands(PathBuf),
}
