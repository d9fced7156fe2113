//! Per-cell, variable-window reduction of a temporal stack of rasters.
//!
//! Each cell carries its own inclusive `[start, end]` unit window (e.g. the
//! growing-season start and end month). The output cell is the reduction of
//! only those layers whose unit index falls inside the window. The
//! computation streams over the stack one unit at a time, keeping one
//! accumulator per cell.

pub mod reducer;
pub mod window;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::{
    error::GridError,
    raster::{is_missing, RasterGrid, DEFAULT_NODATA},
};

pub use reducer::Reducer;
pub use window::{CellWindow, TemporalStack, WindowGrid};

/// How a missing stack value inside a cell's window is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// The unit contributes the reducer's identity.
    #[default]
    Skip,
    /// The whole cell becomes nodata.
    Propagate,
}

/// How a cell with `start > end` is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InvalidWindowPolicy {
    #[default]
    Nodata,
    /// Select nothing, giving the reducer's empty value (0 for a sum).
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateOptions {
    pub reducer: Reducer,
    pub missing: MissingPolicy,
    pub invalid_window: InvalidWindowPolicy,
    pub nodata: f32,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        AggregateOptions {
            reducer: Reducer::Sum,
            missing: MissingPolicy::Skip,
            invalid_window: InvalidWindowPolicy::Nodata,
            nodata: DEFAULT_NODATA,
        }
    }
}

/// Per-cell data-quality counts from one aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub cells: usize,
    /// Start or end was nodata.
    pub missing_windows: usize,
    /// `start > end`.
    pub invalid_windows: usize,
    /// Valid window but no usable unit.
    pub empty_selections: usize,
    /// Bounds fell outside `1..=U`.
    pub clamped_windows: usize,
    /// Nodata because a selected unit was missing (propagate policy).
    pub voided_cells: usize,
}

#[derive(Debug, Clone)]
pub struct Aggregation {
    pub grid: RasterGrid,
    pub stats: AggregationStats,
}

/// Reduces, for every cell, the stack layers selected by that cell's window.
///
/// Shape mismatches between the window and the stack are fatal. Per-cell
/// problems never are: they resolve to nodata or the reducer's empty value
/// and are counted in [`AggregationStats`].
pub fn aggregate(
    stack: &TemporalStack,
    window: &WindowGrid,
    options: &AggregateOptions,
) -> Result<Aggregation, GridError> {
    let shape = stack.shape();
    window.start.check_shape("window start", shape)?;
    window.end.check_shape("window end", shape)?;

    let units = stack.units();
    let nodata = options.nodata;
    let reducer = options.reducer;

    let windows = Array2::from_shape_fn(shape, |index| window.cell(index, units, nodata));
    let mut acc = Array2::from_elem(shape, reducer.identity());
    let mut counts = Array2::<u32>::zeros(shape);
    let mut voided = Array2::from_elem(shape, false);

    for (index, layer) in stack.layers().iter().enumerate() {
        let unit = index + 1;

        Zip::from(&mut acc)
            .and(&mut counts)
            .and(&mut voided)
            .and(&windows)
            .and(&layer.data)
            .for_each(|acc, count, voided, cell, &value| {
                if !cell.contains(unit) {
                    return;
                }
                if is_missing(value, nodata) || layer.is_missing(value) {
                    if options.missing == MissingPolicy::Propagate {
                        *voided = true;
                    }
                    return;
                }
                *acc = reducer.combine(*acc, f64::from(value));
                *count += 1;
            });
    }

    let mut stats = AggregationStats {
        cells: shape.0 * shape.1,
        ..AggregationStats::default()
    };
    let empty_value = reducer.finish(reducer.identity(), 0, nodata);

    let mut data = Array2::from_elem(shape, nodata);
    Zip::from(&mut data)
        .and(&windows)
        .and(&acc)
        .and(&counts)
        .and(&voided)
        .for_each(|out, cell, &acc, &count, &voided| {
            if cell.is_clamped() {
                stats.clamped_windows += 1;
            }

            *out = match cell {
                CellWindow::Missing => {
                    stats.missing_windows += 1;
                    nodata
                }
                CellWindow::Inverted => {
                    stats.invalid_windows += 1;
                    match options.invalid_window {
                        InvalidWindowPolicy::Nodata => nodata,
                        InvalidWindowPolicy::Empty => {
                            stats.empty_selections += 1;
                            empty_value
                        }
                    }
                }
                CellWindow::Empty { .. } => {
                    stats.empty_selections += 1;
                    empty_value
                }
                CellWindow::Units { .. } if voided => {
                    stats.voided_cells += 1;
                    nodata
                }
                CellWindow::Units { .. } => {
                    if count == 0 {
                        stats.empty_selections += 1;
                    }
                    reducer.finish(acc, count, nodata)
                }
            };
        });

    Ok(Aggregation {
        grid: RasterGrid::new(data, nodata, stack.georef().clone()),
        stats,
    })
}

// -- Tests -------------------------------------------------------------------
