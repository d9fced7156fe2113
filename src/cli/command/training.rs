use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;

use super::{
    ensure_dir, monthly_cache_key, read_input, run_pending, settings_of, Job, RunSummary,
};
use crate::{
    cache::ResultCache,
    config::{PipelineConfig, TrainingConfig},
    discovery,
    raster::{
        ops::{clip_to_zone, filter_training_cells, merge_first_valid, TrainingLayers},
        write_raster, RasterGrid,
    },
};

/// Builds the crop ET rasters used to train the effective precipitation
/// model: rainfed cells only, clipped to the training zones.
pub fn training_filter(job: &Job, cache: &mut dyn ResultCache) -> Result<RunSummary> {
    let training = PipelineConfig::section(job.config.training.as_ref(), "training")?;
    ensure_dir(&training.output_dir)?;

    let zones = discovery::list_rasters(&training.zone_dir)?
        .into_iter()
        .map(|file| read_input(&file.path))
        .collect::<Result<Vec<_>>>()?;
    if zones.is_empty() {
        bail!("No training zone raster in {:?}", training.zone_dir);
    }
    debug!("{} training zones", zones.len());

    let tasks = job
        .years
        .iter()
        .flat_map(|&year| training.months.months().map(move |month| (year, month)))
        .map(|(year, month)| (monthly_cache_key("training-filter", year, month), (year, month)))
        .collect();

    Ok(run_pending(
        tasks,
        cache,
        &settings_of(training),
        job.force,
        "Filtering training crop ET",
        |&(year, month)| filter_month(training, &zones, year, month),
    ))
}

fn filter_month(
    training: &TrainingConfig,
    zones: &[RasterGrid],
    year: u16,
    month: u8,
) -> Result<PathBuf> {
    let yearly = |dir: &Path| -> Result<RasterGrid> { read_input(&discovery::yearly_raster(dir, year)?) };

    let crop_et = read_input(&discovery::monthly_raster(&training.crop_et_dir, year, month)?)?;
    let cdl = yearly(&training.cdl_dir)?;
    let rainfed = yearly(&training.rainfed_dir)?;
    let irrigated = yearly(&training.irrigated_dir)?;
    let excess_et = yearly(&training.excess_et_dir)?;

    let layers = TrainingLayers {
        cdl: &cdl,
        rainfed: &rainfed,
        irrigated: &irrigated,
        excess_et: &excess_et,
    };
    let filtered = filter_training_cells(&crop_et, &layers, training.pasture_class)
        .with_context(|| format!("Cannot filter {}-{:02}", year, month))?;

    let clipped = zones
        .iter()
        .map(|zone| clip_to_zone(&filtered, zone))
        .collect::<Result<Vec<_>, _>>()?;
    let merged = merge_first_valid(&clipped)?;

    let output = training
        .output_dir
        .join(format!("CropET_for_training_{}_{}.tif", year, month));
    write_raster(&merged, &output).with_context(|| format!("Cannot write {:?}", output))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::MemoryCache, raster::read_raster};
    use std::fs;
    use tempfile::TempDir;

    const ND: f32 = -9999.0;

    fn write(root: &Path, name: &str, values: &[f32]) {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let grid = RasterGrid::from_vec((1, values.len()), values.to_vec(), ND).unwrap();
        write_raster(&grid, &path).unwrap();
    }

    #[test]
    fn should_keep_rainfed_cells_inside_zones() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        write(root, "et/cropET_2016_5.tif", &[10.0, 20.0, 30.0, 40.0, 50.0]);
        write(root, "cdl/CDL_2016.tif", &[176.0, 1.0, 1.0, 176.0, 1.0]);
        write(root, "rainfed/rainfed_2016.tif", &[1.0, 1.0, 1.0, 1.0, 0.0]);
        write(root, "irrigated/irrigated_2016.tif", &[1.0, ND, 1.0, 1.0, ND]);
        write(root, "excess/excess_ET_filter_2016.tif", &[1.0, 1.0, 1.0, 0.0, 1.0]);
        write(root, "zones/zone_west.tif", &[1.0, ND, 0.0, 1.0, 1.0]);
        write(root, "zones/zone_east.tif", &[ND, 1.0, ND, ND, ND]);

        let config = PipelineConfig::from_yaml(&format!(
            r#"
training:
  crop_et_dir: {root}/et
  rainfed_dir: {root}/rainfed
  irrigated_dir: {root}/irrigated
  cdl_dir: {root}/cdl
  excess_et_dir: {root}/excess
  zone_dir: {root}/zones
  output_dir: {root}/out
  months: [5, 5]
"#,
            root = root.display()
        ))
        .unwrap();
        let job = Job {
            config: &config,
            years: vec![2016],
            force: false,
        };

        let summary = training_filter(&job, &mut MemoryCache::default()).unwrap();
        assert_eq!(summary.failed, 0);

        let grid = read_raster(&root.join("out/CropET_for_training_2016_5.tif")).unwrap();
        assert_eq!(grid.data.iter().copied().collect::<Vec<_>>(), vec![10.0, 20.0, ND, ND, ND]);
    }
}
