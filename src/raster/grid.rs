//! In-memory raster grid and its georeference.

use ndarray::Array2;

use crate::error::GridError;

/// Nodata sentinel used throughout the Western US rasters.
pub const DEFAULT_NODATA: f32 = -9999.0;

/// Spatial reference carried alongside a grid. Opaque to the computations,
/// which only look at shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRef {
    /// GDAL-order affine transform:
    /// `[origin_x, pixel_width, 0, origin_y, 0, -pixel_height]`.
    pub transform: [f64; 6],
    pub epsg: Option<u16>,
}

impl Default for GeoRef {
    fn default() -> Self {
        GeoRef {
            transform: [0.0, 1.0, 0.0, 0.0, 0.0, -1.0],
            epsg: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub data: Array2<f32>,
    pub nodata: f32,
    pub georef: GeoRef,
}

impl RasterGrid {
    pub fn new(data: Array2<f32>, nodata: f32, georef: GeoRef) -> Self {
        RasterGrid {
            data,
            nodata,
            georef,
        }
    }

    /// A grid of `shape` where every cell is `nodata`.
    pub fn missing(shape: (usize, usize), nodata: f32, georef: GeoRef) -> Self {
        RasterGrid::new(Array2::from_elem(shape, nodata), nodata, georef)
    }

    /// Builds a grid from row-major values with a default georeference.
    #[cfg(test)]
    pub fn from_vec(
        shape: (usize, usize),
        values: Vec<f32>,
        nodata: f32,
    ) -> Result<Self, ndarray::ShapeError> {
        let data = Array2::from_shape_vec(shape, values)?;
        Ok(RasterGrid::new(data, nodata, GeoRef::default()))
    }

    /// Same georeference and nodata, new cell values.
    pub fn with_data(&self, data: Array2<f32>) -> Self {
        RasterGrid::new(data, self.nodata, self.georef.clone())
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_missing(&self, value: f32) -> bool {
        is_missing(value, self.nodata)
    }

    pub fn count_missing(&self) -> usize {
        self.data.iter().filter(|v| self.is_missing(**v)).count()
    }

    /// Fails with [`GridError::ShapeMismatch`] unless this grid has `expected` shape.
    pub fn check_shape(&self, what: &str, expected: (usize, usize)) -> Result<(), GridError> {
        let found = self.shape();
        if found == expected {
            Ok(())
        } else {
            Err(GridError::ShapeMismatch {
                what: what.to_string(),
                expected,
                found,
            })
        }
    }
}

/// NaN always counts as missing, whatever the sentinel.
pub fn is_missing(value: f32, nodata: f32) -> bool {
    value.is_nan() || value == nodata
}
