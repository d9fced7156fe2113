//! Fills years that have no land-cover raster with the most frequent class
//! over the years that do.

use anyhow::{Context, Result};
use log::info;

use super::{cache_key, ensure_dir, read_input, settings_of, Job, RunSummary};
use crate::{
    cache::ResultCache,
    cli::create_spinner,
    config::PipelineConfig,
    discovery,
    raster::{ops::majority_vote, write_raster},
};

pub fn fill_years(job: &Job, cache: &mut dyn ResultCache) -> Result<RunSummary> {
    let occurrence = PipelineConfig::section(job.config.occurrence.as_ref(), "occurrence")?;
    let settings = settings_of(occurrence);
    let mut summary = RunSummary::default();

    let targets: Vec<u16> = occurrence
        .target_years
        .iter()
        .copied()
        .filter(|&year| {
            let cached = !job.force && cache.is_fresh(&cache_key(&occurrence.prefix, year), &settings);
            if cached {
                info!("Skipping {} {}: already produced", occurrence.prefix, year);
                summary.cached += 1;
            }
            !cached
        })
        .collect();
    if targets.is_empty() {
        return Ok(summary);
    }
    ensure_dir(&occurrence.output_dir)?;

    let pb = create_spinner(format!(
        "Voting over {} years of {}",
        occurrence.source_years.len(),
        occurrence.prefix
    ));

    let layers = occurrence
        .source_years
        .iter()
        .map(|&year| read_input(&discovery::yearly_raster(&occurrence.input_dir, year)?))
        .collect::<Result<Vec<_>>>()?;
    let reference = read_input(&occurrence.reference)?;
    let voted = majority_vote(&layers, &reference).context("Cannot vote over source years")?;

    for year in targets {
        let output = occurrence
            .output_dir
            .join(format!("{}_{}.tif", occurrence.prefix, year));
        write_raster(&voted, &output).with_context(|| format!("Cannot write {:?}", output))?;

        cache.put(&cache_key(&occurrence.prefix, year), output.clone(), &settings);
        summary.saved.push(output);
    }
    pb.finish_with_message("Done");

    Ok(summary)
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
    fn should_write_voted_raster_for_each_target_year() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("cdl")).unwrap();

        for (year, values) in [
            (2008, [1.0, 5.0, ND]),
            (2009, [1.0, 6.0, 2.0]),
            (2010, [3.0, 6.0, 2.0]),
        ] {
            let grid = RasterGrid::from_vec((1, 3), values.to_vec(), ND).unwrap();
            write_raster(&grid, &root.join(format!("cdl/CDL_{}.tif", year))).unwrap();
        }
        let reference = RasterGrid::from_vec((1, 3), vec![1.0, ND, 1.0], ND).unwrap();
        write_raster(&reference, &root.join("reference.tif")).unwrap();

        let config = PipelineConfig::from_yaml(&format!(
            r#"
occurrence:
  input_dir: {root}/cdl
  source_years: [2008, 2009, 2010]
  target_years: [2000, 2001]
  reference: {root}/reference.tif
  output_dir: {root}/filled
  prefix: CDL
"#,
            root = root.display()
        ))
        .unwrap();
        let job = Job {
            config: &config,
            years: vec![],
            force: false,
        };
        let mut cache = MemoryCache::default();

        let summary = fill_years(&job, &mut cache).unwrap();
        assert_eq!(summary.saved.len(), 2);

        let grid = read_raster(&root.join("filled/CDL_2001.tif")).unwrap();
        assert_eq!(grid.data.iter().copied().collect::<Vec<_>>(), vec![1.0, ND, 2.0]);

        let rerun = fill_years(&job, &mut cache).unwrap();
        assert_eq!(rerun.cached, 2);
        assert!(rerun.saved.is_empty());
    }
}
