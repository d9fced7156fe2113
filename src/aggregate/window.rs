//! Temporal stacks of layers and the per-cell unit windows that select from
//! them.

use ndarray::Array2;

use crate::{
    error::GridError,
    raster::{is_missing, GeoRef, RasterGrid},
};

/// Layers for units `1..=U`, in unit order, all the same shape.
#[derive(Debug, Clone)]
pub struct TemporalStack {
    layers: Vec<RasterGrid>,
}

impl TemporalStack {
    pub fn new(layers: Vec<RasterGrid>) -> Result<Self, GridError> {
        let first = layers.first().ok_or(GridError::Empty("stack layer"))?;
        let shape = first.shape();
        for (index, layer) in layers.iter().enumerate() {
            layer.check_shape(&format!("stack layer {}", index + 1), shape)?;
        }

        Ok(TemporalStack { layers })
    }

    /// Number of units `U`.
    pub fn units(&self) -> usize {
        self.layers.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.layers[0].shape()
    }

    pub fn georef(&self) -> &GeoRef {
        &self.layers[0].georef
    }

    pub fn layers(&self) -> &[RasterGrid] {
        &self.layers
    }

    /// Layer for a 1-based unit index.
    #[cfg(test)]
    pub fn layer(&self, unit: usize) -> Option<&RasterGrid> {
        unit.checked_sub(1).and_then(|index| self.layers.get(index))
    }
}

/// Inclusive per-cell `[start, end]` unit bounds.
#[derive(Debug, Clone)]
pub struct WindowGrid {
    pub start: RasterGrid,
    pub end: RasterGrid,
}

impl WindowGrid {
    pub fn new(start: RasterGrid, end: RasterGrid) -> Result<Self, GridError> {
        end.check_shape("window end", start.shape())?;

        Ok(WindowGrid { start, end })
    }

    /// Every cell selects all of `1..=units`.
    pub fn full(shape: (usize, usize), units: usize, nodata: f32) -> Self {
        let start = RasterGrid::new(Array2::from_elem(shape, 1.0), nodata, GeoRef::default());
        let end = start.with_data(Array2::from_elem(shape, units as f32));

        WindowGrid { start, end }
    }

    /// Resolves the window of one cell against a stack of `units` layers.
    pub fn cell(&self, index: (usize, usize), units: usize, nodata: f32) -> CellWindow {
        let start = self.start.data[index];
        let end = self.end.data[index];

        if is_missing(start, nodata)
            || is_missing(end, nodata)
            || self.start.is_missing(start)
            || self.end.is_missing(end)
        {
            return CellWindow::Missing;
        }
        if start > end {
            return CellWindow::Inverted;
        }

        let clamped = start < 1.0 || end > units as f32;
        let first = start.ceil().max(1.0);
        let last = end.floor().min(units as f32);

        if first > last {
            CellWindow::Empty { clamped }
        } else {
            CellWindow::Units {
                first: first as usize,
                last: last as usize,
                clamped,
            }
        }
    }
}

/// What a cell's window selects once bounds are clamped to `1..=U`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellWindow {
    /// Start or end is nodata.
    Missing,
    /// `start > end`.
    Inverted,
    /// Valid bounds that select no unit, e.g. `[13, 14]` for twelve months.
    Empty { clamped: bool },
    Units {
        first: usize,
        last: usize,
        clamped: bool,
    },
}

impl CellWindow {
    pub fn contains(&self, unit: usize) -> bool {
        match self {
            CellWindow::Units { first, last, .. } => (*first..=*last).contains(&unit),
            _ => false,
        }
    }

    pub fn is_clamped(&self) -> bool {
        matches!(
            self,
            CellWindow::Empty { clamped: true } | CellWindow::Units { clamped: true, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ND: f32 = -9999.0;

    fn window(start: &[f32], end: &[f32]) -> WindowGrid {
        WindowGrid::new(
            RasterGrid::from_vec((1, start.len()), start.to_vec(), ND).unwrap(),
            RasterGrid::from_vec((1, end.len()), end.to_vec(), ND).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn should_resolve_cell_windows() {
        let w = window(&[4.0, ND, 5.0, 0.0, 13.0, 2.5], &[9.0, 9.0, 4.0, 15.0, 14.0, 3.5]);

        assert_eq!(
            w.cell((0, 0), 12, ND),
            CellWindow::Units { first: 4, last: 9, clamped: false }
        );
        assert_eq!(w.cell((0, 1), 12, ND), CellWindow::Missing);
        assert_eq!(w.cell((0, 2), 12, ND), CellWindow::Inverted);
        assert_eq!(
            w.cell((0, 3), 12, ND),
            CellWindow::Units { first: 1, last: 12, clamped: true }
        );
        assert_eq!(w.cell((0, 4), 12, ND), CellWindow::Empty { clamped: true });
        assert_eq!(
            w.cell((0, 5), 12, ND),
            CellWindow::Units { first: 3, last: 3, clamped: false }
        );
    }

    #[test]
    fn should_reject_empty_or_ragged_stack() {
        assert_eq!(
            TemporalStack::new(vec![]).unwrap_err(),
            GridError::Empty("stack layer")
        );

        let a = RasterGrid::missing((2, 2), ND, GeoRef::default());
        let b = RasterGrid::missing((2, 3), ND, GeoRef::default());
        assert!(matches!(
            TemporalStack::new(vec![a, b]),
            Err(GridError::ShapeMismatch { found: (2, 3), .. })
        ));
    }

    #[test]
    fn should_index_layers_from_one() {
        let layers = (1..=3)
            .map(|u| RasterGrid::from_vec((1, 1), vec![u as f32], ND).unwrap())
            .collect();
        let stack = TemporalStack::new(layers).unwrap();

        assert_eq!(stack.units(), 3);
        assert_eq!(stack.layer(1).unwrap().data[[0, 0]], 1.0);
        assert_eq!(stack.layer(3).unwrap().data[[0, 0]], 3.0);
        assert!(stack.layer(0).is_none());
        assert!(stack.layer(4).is_none());
    }

    #[test]
    fn should_build_full_window() {
        let w = WindowGrid::full((2, 2), 12, ND);

        assert_eq!(
            w.cell((1, 1), 12, ND),
            CellWindow::Units { first: 1, last: 12, clamped: false }
        );
    }
}
