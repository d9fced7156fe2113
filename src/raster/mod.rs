//! Raster grids, GeoTIFF I/O and cell-wise operations.

pub mod geotiff;
pub mod grid;
pub mod ops;

#[cfg(test)]
pub use geotiff::read_band;
pub use geotiff::{read_bands, read_raster, write_bands, write_raster};
pub use grid::{is_missing, GeoRef, RasterGrid, DEFAULT_NODATA};
