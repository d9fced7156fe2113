use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{cache_key, ensure_dir, read_input, run_pending, settings_of, Job, RunSummary};
use crate::{
    aggregate::TemporalStack,
    cache::ResultCache,
    config::{BundleConfig, PipelineConfig},
    discovery,
    raster::write_bands,
};

/// Compiles the configured months of each year into one multi-band raster,
/// band `i` holding the `i`-th month of the range.
pub fn bundle(job: &Job, cache: &mut dyn ResultCache) -> Result<RunSummary> {
    let bundle = PipelineConfig::section(job.config.bundle.as_ref(), "bundle")?;
    ensure_dir(&bundle.output_dir)?;

    let tasks = job
        .years
        .iter()
        .map(|&year| (cache_key("bundle", year), year))
        .collect();

    Ok(run_pending(
        tasks,
        cache,
        &settings_of(bundle),
        job.force,
        "Compiling monthly rasters",
        |&year| bundle_year(bundle, year),
    ))
}

fn bundle_year(bundle: &BundleConfig, year: u16) -> Result<PathBuf> {
    let layers = bundle
        .months
        .months()
        .map(|month| read_input(&discovery::monthly_raster(&bundle.monthly_dir, year, month)?))
        .collect::<Result<Vec<_>>>()?;
    let stack = TemporalStack::new(layers).with_context(|| format!("Cannot bundle {}", year))?;

    let output = bundle
        .output_dir
        .join(format!("effective_precip_{}_monthly.tif", year));
    write_bands(stack.layers(), &output).with_context(|| format!("Cannot write {:?}", output))?;

    Ok(output)
}
