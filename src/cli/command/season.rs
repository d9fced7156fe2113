//! Growing-season effective precipitation: every cell sums only the monthly
//! rasters that fall inside its own growing season.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};

use super::{
    cache_key, ensure_dir, load_monthly_stack, read_input, run_pending, settings_of, Job,
    RunSummary,
};
use crate::{
    aggregate::{aggregate, AggregateOptions, Aggregation, AggregationStats, WindowGrid},
    cache::ResultCache,
    cli::SeasonArgs,
    config::{PipelineConfig, SeasonConfig, WindowSource},
    discovery,
    raster::{read_bands, write_raster},
};

pub fn season_sum(job: &Job, args: &SeasonArgs, cache: &mut dyn ResultCache) -> Result<RunSummary> {
    let season = PipelineConfig::section(job.config.season.as_ref(), "season")?;
    ensure_dir(&season.output_dir)?;

    let mut options = season.aggregate_options(job.config.nodata);
    if let Some(reducer) = args.reducer {
        options.reducer = reducer;
    }
    if let Some(missing) = args.missing {
        options.missing = missing;
    }
    if let Some(invalid_window) = args.invalid_window {
        options.invalid_window = invalid_window;
    }
    info!("Growing-season aggregation with {:?}", options);

    let tasks = job
        .years
        .iter()
        .map(|&year| (cache_key("season-sum", year), year))
        .collect();

    Ok(run_pending(
        tasks,
        cache,
        &settings_of(&(season, &options)),
        job.force,
        "Summing growing-season effective precipitation",
        |&year| sum_year(season, &options, year),
    ))
}

fn sum_year(season: &SeasonConfig, options: &AggregateOptions, year: u16) -> Result<PathBuf> {
    let monthly = discovery::monthly_rasters(&season.monthly_dir, year)?;
    let stack = load_monthly_stack(&monthly, season.units, options.nodata)
        .with_context(|| format!("Cannot build the monthly stack of {}", year))?;
    let window = load_window(&season.window, year)?;

    let Aggregation { grid, stats } =
        aggregate(&stack, &window, options).with_context(|| format!("Cannot aggregate {}", year))?;
    log_stats(year, &stats);
    debug!("{}: {} of {} cells are nodata", year, grid.count_missing(), stats.cells);

    let output = season.output_dir.join(format!("effective_precip_{}.tif", year));
    write_raster(&grid, &output).with_context(|| format!("Cannot write {:?}", output))?;

    Ok(output)
}

fn load_window(source: &WindowSource, year: u16) -> Result<WindowGrid> {
    match source {
        WindowSource::Banded { season_dir } => {
            let path = discovery::yearly_raster(season_dir, year)?;
            let mut bands = read_bands(&path)
                .with_context(|| format!("Cannot read {:?}", path))?
                .into_iter();

            match (bands.next(), bands.next()) {
                (Some(start), Some(end)) => Ok(WindowGrid::new(start, end)?),
                _ => bail!("{:?} needs a start band and an end band", path),
            }
        }
        WindowSource::Split { start_dir, end_dir } => {
            let start = read_input(&discovery::yearly_raster(start_dir, year)?)?;
            let end = read_input(&discovery::yearly_raster(end_dir, year)?)?;

            Ok(WindowGrid::new(start, end)?)
        }
    }
}

fn log_stats(year: u16, stats: &AggregationStats) {
    debug!("{}: {:?}", year, stats);

    if stats.invalid_windows > 0 {
        warn!(
            "{}: {} cells have a season starting after it ends",
            year, stats.invalid_windows
        );
    }
    if stats.empty_selections > 0 {
        warn!(
            "{}: {} cells selected no usable month",
            year, stats.empty_selections
        );
    }
    if stats.clamped_windows > 0 {
        info!(
            "{}: {} cells had season bounds outside the calendar",
            year, stats.clamped_windows
        );
    }
    if stats.voided_cells > 0 {
        info!(
            "{}: {} cells voided by a missing month",
            year, stats.voided_cells
        );
    }
}

// -- Tests -------------------------------------------------------------------
