//! Cell-wise operations over aligned grids: masking, training filters, zone
//! clipping, merging and majority voting.

use ndarray::Zip;

use super::{is_missing, RasterGrid};
use crate::error::GridError;

/// USDA CDL class for grassland/pasture.
pub const CDL_GRASS_PASTURE: f32 = 176.0;

/// Stamps nodata into `grid` wherever `mask` is missing.
pub fn mask_missing(grid: &RasterGrid, mask: &RasterGrid) -> Result<RasterGrid, GridError> {
    mask.check_shape("mask", grid.shape())?;

    let data = Zip::from(&grid.data)
        .and(&mask.data)
        .map_collect(|&value, &m| if mask.is_missing(m) { grid.nodata } else { value });

    Ok(grid.with_data(data))
}

/// Yearly land-cover layers used to pick rainfed training cells.
pub struct TrainingLayers<'a> {
    pub cdl: &'a RasterGrid,
    pub rainfed: &'a RasterGrid,
    pub irrigated: &'a RasterGrid,
    pub excess_et: &'a RasterGrid,
}

/// Keeps crop ET only over rainfed cells that pass the excess-ET filter and
/// are either pasture or free of irrigated cropland.
pub fn filter_training_cells(
    crop_et: &RasterGrid,
    layers: &TrainingLayers,
    pasture_class: f32,
) -> Result<RasterGrid, GridError> {
    let shape = crop_et.shape();
    layers.cdl.check_shape("cdl", shape)?;
    layers.rainfed.check_shape("rainfed cropland", shape)?;
    layers.irrigated.check_shape("irrigated cropland", shape)?;
    layers.excess_et.check_shape("excess ET filter", shape)?;

    let data = Zip::from(&crop_et.data)
        .and(&layers.cdl.data)
        .and(&layers.rainfed.data)
        .and(&layers.irrigated.data)
        .and(&layers.excess_et.data)
        .map_collect(|&et, &cdl, &rainfed, &irrigated, &excess_et| {
            let rainfed = rainfed == 1.0;
            let passes_filter = excess_et == 1.0;
            let pasture = cdl == pasture_class;
            let unirrigated = layers.irrigated.is_missing(irrigated);

            if rainfed && passes_filter && (pasture || unirrigated) {
                et
            } else {
                crop_et.nodata
            }
        });

    Ok(crop_et.with_data(data))
}

/// Keeps `grid` inside a rasterised zone (any non-missing, non-zero cell).
pub fn clip_to_zone(grid: &RasterGrid, zone: &RasterGrid) -> Result<RasterGrid, GridError> {
    zone.check_shape("zone", grid.shape())?;

    let data = Zip::from(&grid.data).and(&zone.data).map_collect(|&value, &z| {
        if zone.is_missing(z) || z == 0.0 {
            grid.nodata
        } else {
            value
        }
    });

    Ok(grid.with_data(data))
}

/// Overlays grids so the first valid value seen for each cell wins.
pub fn merge_first_valid(grids: &[RasterGrid]) -> Result<RasterGrid, GridError> {
    let (first, rest) = grids.split_first().ok_or(GridError::Empty("grid to merge"))?;
    let nodata = first.nodata;

    let mut merged = first.with_data(first.data.mapv(|v| if is_missing(v, nodata) { nodata } else { v }));
    for grid in rest {
        grid.check_shape("merged grid", merged.shape())?;
        Zip::from(&mut merged.data).and(&grid.data).for_each(|out, &value| {
            if is_missing(*out, nodata) && !grid.is_missing(value) {
                *out = value;
            }
        });
    }

    Ok(merged)
}

/// Picks, per cell, the class that occurs most often across `layers`.
///
/// Missing and negative values vote for class 0; ties go to the smallest
/// class. Cells missing in `reference` come out as nodata.
pub fn majority_vote(layers: &[RasterGrid], reference: &RasterGrid) -> Result<RasterGrid, GridError> {
    let first = layers.first().ok_or(GridError::Empty("layer to vote over"))?;
    let shape = first.shape();
    for layer in layers {
        layer.check_shape("voting layer", shape)?;
    }
    reference.check_shape("reference", shape)?;

    let nodata = first.nodata;
    let mut votes = Vec::with_capacity(layers.len());
    let data = ndarray::Array2::from_shape_fn(shape, |index| {
        if reference.is_missing(reference.data[index]) {
            return nodata;
        }

        votes.clear();
        votes.extend(layers.iter().map(|layer| {
            let value = layer.data[index];
            if layer.is_missing(value) || value < 0.0 {
                0
            } else {
                value.round() as u32
            }
        }));

        most_frequent(&mut votes) as f32
    });

    Ok(first.with_data(data))
}

fn most_frequent(votes: &mut [u32]) -> u32 {
    votes.sort_unstable();

    let mut best = (0, 0);
    for run in votes.chunk_by(|a, b| a == b) {
        if run.len() > best.1 {
            best = (run[0], run.len());
        }
    }

    best.0
}
