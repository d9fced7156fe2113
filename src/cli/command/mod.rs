pub mod bundle;
pub mod occurrence;
pub mod predictors;
pub mod season;
pub mod total;
pub mod training;

use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, error, info};
use rayon::prelude::*;

pub use bundle::bundle;
pub use occurrence::fill_years;
pub use predictors::predictors;
pub use season::season_sum;
pub use total::season_total;
pub use training::training_filter;

use crate::{
    aggregate::TemporalStack,
    cache::ResultCache,
    cli::create_progress_bar,
    config::PipelineConfig,
    raster::{read_raster, RasterGrid},
};

/// What every job gets from the command line and the configuration.
pub struct Job<'a> {
    pub config: &'a PipelineConfig,
    pub years: Vec<u16>,
    pub force: bool,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub saved: Vec<PathBuf>,
    pub cached: usize,
    pub failed: usize,
}

pub fn cache_key(job: &str, year: u16) -> String {
    format!("{}/{}", job, year)
}

pub fn monthly_cache_key(job: &str, year: u16, month: u8) -> String {
    format!("{}/{}-{:02}", job, year, month)
}

/// Fingerprint of the configuration an output was produced with. Any change,
/// including the output directory, makes cached outputs stale.
pub fn settings_of(parts: &impl Debug) -> String {
    format!("{:?}", parts)
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create output directory {:?}", dir))
}

pub fn read_input(path: &Path) -> Result<RasterGrid> {
    read_raster(path).with_context(|| format!("Cannot read {:?}", path))
}

/// Runs `produce` for every task whose output is not cached under the same
/// `settings`, in parallel, and records each produced file under the task's
/// key. A failing task is logged and counted; the others carry on.
pub fn run_pending<T, F>(
    tasks: Vec<(String, T)>,
    cache: &mut dyn ResultCache,
    settings: &str,
    force: bool,
    message: &str,
    produce: F,
) -> RunSummary
where
    T: Send,
    F: Fn(&T) -> Result<PathBuf> + Sync,
{
    let mut summary = RunSummary::default();

    let pending: Vec<(String, T)> = tasks
        .into_iter()
        .filter(|(key, _)| {
            let cached = !force && cache.is_fresh(key, settings);
            if cached {
                info!("Skipping {}: already produced", key);
                summary.cached += 1;
            }
            !cached
        })
        .collect();

    let pb = create_progress_bar(pending.len() as u64, message.to_string());
    let results: Vec<(String, Result<PathBuf>)> = pending
        .into_par_iter()
        .map(|(key, task)| {
            let result = produce(&task);
            pb.inc(1);
            (key, result)
        })
        .collect();
    pb.finish_with_message("Done");

    for (key, result) in results {
        match result {
            Ok(path) => {
                debug!("{} -> {:?}", key, path);
                cache.put(&key, path.clone(), settings);
                summary.saved.push(path);
            }
            Err(e) => {
                error!("{} failed: {:#}", key, e);
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Reads monthly rasters into a stack of `units` layers. A month without a
/// file becomes an all-nodata layer.
pub fn load_monthly_stack(
    monthly: &[(u8, PathBuf)],
    units: usize,
    nodata: f32,
) -> Result<TemporalStack> {
    let mut layers: Vec<Option<RasterGrid>> = vec![None; units];

    for (month, path) in monthly {
        let slot = layers
            .get_mut(usize::from(*month).wrapping_sub(1))
            .ok_or_else(|| anyhow!("{:?} is month {}, outside 1..={}", path, month, units))?;
        *slot = Some(read_input(path)?);
    }

    let (shape, georef) = match layers.iter().flatten().next() {
        Some(template) => (template.shape(), template.georef.clone()),
        None => bail!("No monthly rasters found"),
    };

    let layers = layers
        .into_iter()
        .enumerate()
        .map(|(index, layer)| {
            layer.unwrap_or_else(|| {
                debug!("Month {} has no raster, treated as nodata", index + 1);
                RasterGrid::missing(shape, nodata, georef.clone())
            })
        })
        .collect();

    Ok(TemporalStack::new(layers)?)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::MemoryCache, raster::write_raster};
    use tempfile::TempDir;

    #[test]
    fn should_make_cache_keys() {
        assert_eq!(cache_key("season-sum", 2016), "season-sum/2016");
        assert_eq!(monthly_cache_key("predictors", 2016, 5), "predictors/2016-05");
    }

    #[test]
    fn should_fill_months_without_raster() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("peff_2016_2.tif");
        let grid = RasterGrid::from_vec((1, 2), vec![3.0, 4.0], -9999.0).unwrap();
        write_raster(&grid, &path).unwrap();

        let stack = load_monthly_stack(&[(2, path)], 3, -9999.0).unwrap();

        assert_eq!(stack.units(), 3);
        assert_eq!(stack.layer(1).unwrap().count_missing(), 2);
        assert_eq!(stack.layer(2).unwrap().data, grid.data);
        assert_eq!(stack.layer(3).unwrap().count_missing(), 2);
    }

    #[test]
    fn should_reject_month_beyond_units() {
        let result = load_monthly_stack(&[(5, PathBuf::from("peff_2016_5.tif"))], 3, -9999.0);

        assert!(result.is_err());
        assert!(load_monthly_stack(&[], 3, -9999.0).is_err());
    }

    #[test]
    fn should_skip_cached_and_count_failures() {
        let temp_dir = TempDir::new().unwrap();
        let existing = temp_dir.path().join("done.tif");
        fs::write(&existing, b"").unwrap();

        let mut cache = MemoryCache::default();
        cache.put("job/2015", existing.clone(), "v1");

        let tasks = vec![
            ("job/2015".to_string(), 2015),
            ("job/2016".to_string(), 2016),
            ("job/2017".to_string(), 2017),
        ];
        let summary = run_pending(tasks, &mut cache, "v1", false, "Testing", |year: &u16| {
            if *year == 2017 {
                bail!("no inputs for 2017")
            }
            Ok(temp_dir.path().join(format!("{}.tif", year)))
        });

        assert_eq!(summary.cached, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.saved, vec![temp_dir.path().join("2016.tif")]);
        assert!(cache.get("job/2016").is_some());
        assert!(cache.get("job/2017").is_none());
    }

    #[test]
    fn should_rerun_cached_task_when_settings_change() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("2015.tif");
        fs::write(&output, b"").unwrap();

        let mut cache = MemoryCache::default();
        cache.put("job/2015", output.clone(), "v1");

        let tasks = vec![("job/2015".to_string(), 2015)];
        let summary = run_pending(tasks, &mut cache, "v2", false, "Testing", |_: &u16| {
            Ok(output.clone())
        });

        assert_eq!(summary.cached, 0);
        assert_eq!(summary.saved, vec![output]);
        assert_eq!(cache.get("job/2015").unwrap().settings, "v2");
    }

    #[test]
    fn should_fingerprint_output_location() {
        let first = settings_of(&(PathBuf::from("/data/out"), 2016));
        let second = settings_of(&(PathBuf::from("/data/out2"), 2016));

        assert_ne!(first, second);
    }
}
