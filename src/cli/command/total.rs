use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{
    cache_key, ensure_dir, load_monthly_stack, read_input, run_pending, settings_of, Job,
    RunSummary,
};
use crate::{
    aggregate::{aggregate, AggregateOptions, WindowGrid},
    cache::ResultCache,
    config::{PipelineConfig, TotalConfig},
    discovery,
    raster::{ops::mask_missing, write_raster},
};

/// Sums every monthly raster of a year, then blanks cells the yearly mask
/// does not cover.
pub fn season_total(job: &Job, cache: &mut dyn ResultCache) -> Result<RunSummary> {
    let total = PipelineConfig::section(job.config.total.as_ref(), "total")?;
    ensure_dir(&total.output_dir)?;

    let options = AggregateOptions {
        nodata: job.config.nodata,
        ..AggregateOptions::default()
    };

    let tasks = job
        .years
        .iter()
        .map(|&year| (cache_key("season-total", year), year))
        .collect();

    Ok(run_pending(
        tasks,
        cache,
        &settings_of(&(total, &options)),
        job.force,
        "Summing yearly effective precipitation",
        |&year| total_year(total, &options, year),
    ))
}

fn total_year(total: &TotalConfig, options: &AggregateOptions, year: u16) -> Result<PathBuf> {
    let monthly = discovery::monthly_rasters(&total.monthly_dir, year)?;
    let units = monthly.iter().map(|(month, _)| usize::from(*month)).max().unwrap_or(0);
    let stack = load_monthly_stack(&monthly, units, options.nodata)?;

    let window = WindowGrid::full(stack.shape(), stack.units(), options.nodata);
    let summed = aggregate(&stack, &window, options)?.grid;

    let mask = read_input(&discovery::yearly_raster(&total.mask_dir, year)?)?;
    let masked = mask_missing(&summed, &mask).with_context(|| format!("Cannot mask {}", year))?;

    let output = total.output_dir.join(format!("effective_precip_{}.tif", year));
    write_raster(&masked, &output).with_context(|| format!("Cannot write {:?}", output))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryCache,
        raster::{read_raster, RasterGrid},
    };
    use std::fs;
    use tempfile::TempDir;

    const ND: f32 = -9999.0;

    #[test]
    fn should_sum_all_months_inside_mask() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for dir in ["monthly", "mask"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }

        for (month, values) in [(1, [1.0, 2.0, 3.0]), (2, [10.0, ND, 30.0])] {
            let grid = RasterGrid::from_vec((1, 3), values.to_vec(), ND).unwrap();
            write_raster(&grid, &root.join(format!("monthly/peff_2016_{}.tif", month))).unwrap();
        }
        let mask = RasterGrid::from_vec((1, 3), vec![4.0, 4.0, ND], ND).unwrap();
        write_raster(&mask, &root.join("mask/irrigated_cropET_2016.tif")).unwrap();

        let config = PipelineConfig::from_yaml(&format!(
            "total:\n  monthly_dir: {root}/monthly\n  mask_dir: {root}/mask\n  output_dir: {root}/out\n",
            root = root.display()
        ))
        .unwrap();
        let job = Job {
            config: &config,
            years: vec![2016],
            force: false,
        };

        let summary = season_total(&job, &mut MemoryCache::default()).unwrap();
        assert_eq!(summary.failed, 0);

        let grid = read_raster(&root.join("out/effective_precip_2016.tif")).unwrap();
        assert_eq!(grid.data.iter().copied().collect::<Vec<_>>(), vec![11.0, 2.0, ND]);
    }
}
