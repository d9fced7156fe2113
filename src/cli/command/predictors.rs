//! Flattens predictor rasters into one table per year and month, one row per
//! grid cell, for the effective precipitation model.

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;

use super::{
    ensure_dir, monthly_cache_key, read_input, run_pending, settings_of, Job, RunSummary,
};
use crate::{
    cache::ResultCache,
    config::{PipelineConfig, PredictorsConfig},
    discovery,
    parquet::{save_predictors, ColumnData, PredictorTable},
    raster::RasterGrid,
};

/// Output names that differ from the configured variable names.
const RENAMED: &[(&str, &str)] = &[("Rainfed_Frac", "Cropland_Frac")];

pub fn predictors(job: &Job, cache: &mut dyn ResultCache) -> Result<RunSummary> {
    let predictors = PipelineConfig::section(job.config.predictors.as_ref(), "predictors")?;
    ensure_dir(&predictors.output_dir)?;

    let tasks = job
        .years
        .iter()
        .flat_map(|&year| predictors.months.months().map(move |month| (year, month)))
        .map(|(year, month)| (monthly_cache_key("predictors", year, month), (year, month)))
        .collect();

    Ok(run_pending(
        tasks,
        cache,
        &settings_of(predictors),
        job.force,
        "Creating predictor tables",
        |&(year, month)| save_month(predictors, year, month),
    ))
}

fn save_month(predictors: &PredictorsConfig, year: u16, month: u8) -> Result<PathBuf> {
    let table = build_table(predictors, year, month)?;
    debug!(
        "{}-{:02}: {} rows of {}",
        year,
        month,
        table.num_rows().unwrap_or(0),
        table.column_names().join(", ")
    );

    let output = predictors
        .output_dir
        .join(format!("predictors_{}_{}.parquet", year, month));
    save_predictors(&table, &output).with_context(|| format!("Cannot write {:?}", output))?;

    Ok(output)
}

fn build_table(predictors: &PredictorsConfig, year: u16, month: u8) -> Result<PredictorTable> {
    let mut table = PredictorTable::default();
    let mut shape = None;

    for name in &predictors.include {
        let grid = read_input(&variable_path(predictors, name, year, month)?)?;
        let expected = *shape.get_or_insert(grid.shape());
        grid.check_shape(name, expected)?;

        table.push(output_name(name), ColumnData::Float32(flatten(&grid)))?;
    }

    let Some(rows) = table.num_rows() else {
        bail!("No predictor variable to include");
    };
    table.push("month", ColumnData::Int32(vec![i32::from(month); rows]))?;

    Ok(table)
}

fn variable_path(predictors: &PredictorsConfig, name: &str, year: u16, month: u8) -> Result<PathBuf> {
    let dir = |dirs: &BTreeMap<String, PathBuf>| dirs.get(name).cloned();

    if let Some(dir) = dir(&predictors.monthly) {
        return discovery::monthly_raster(&dir, year, month);
    }
    if let Some(dir) = dir(&predictors.yearly) {
        return discovery::yearly_raster(&dir, year);
    }
    if let Some(dir) = dir(&predictors.static_) {
        return discovery::static_raster(&dir);
    }

    bail!("Predictor `{}` has no configured directory", name)
}

fn output_name(name: &str) -> &str {
    RENAMED
        .iter()
        .find(|(from, _)| *from == name)
        .map_or(name, |(_, to)| *to)
}

/// Row-major cell values with missing cells written as 0.
fn flatten(grid: &RasterGrid) -> Vec<f32> {
    grid.data
        .iter()
        .map(|&value| if grid.is_missing(value) { 0.0 } else { value })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::MemoryCache, raster::write_raster};
    use std::{fs, path::Path};
    use tempfile::TempDir;

    const ND: f32 = -9999.0;

    fn write(root: &Path, name: &str, shape: (usize, usize), values: &[f32]) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let grid = RasterGrid::from_vec(shape, values.to_vec(), ND).unwrap();
        write_raster(&grid, &path).unwrap();
    }

    fn config(root: &Path) -> PredictorsConfig {
        PipelineConfig::from_yaml(&format!(
            r#"
predictors:
  months: [5, 6]
  monthly:
    Precipitation: {root}/precip
  yearly:
    Irrigated: {root}/irrigated
  static:
    Rainfed_Frac: {root}/frac
    Slope: {root}/slope
  include: [Precipitation, Rainfed_Frac, Irrigated]
  output_dir: {root}/out
"#,
            root = root.display()
        ))
        .unwrap()
        .predictors
        .unwrap()
    }

    #[test]
    fn should_flatten_included_variables() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "precip/prism_precip_2016_5.tif", (1, 3), &[1.0, ND, 3.0]);
        write(root, "irrigated/irrigated_2016.tif", (1, 3), &[0.0, 1.0, 1.0]);
        write(root, "frac/rainfed_frac.tif", (1, 3), &[0.5, 0.25, ND]);
        write(root, "slope/slope.tif", (1, 3), &[9.0, 9.0, 9.0]);

        let table = build_table(&config(root), 2016, 5).unwrap();

        assert_eq!(
            table.column_names(),
            vec!["Precipitation", "Cropland_Frac", "Irrigated", "month"]
        );
        assert_eq!(
            table.column("Precipitation"),
            Some(&ColumnData::Float32(vec![1.0, 0.0, 3.0]))
        );
        assert_eq!(
            table.column("Cropland_Frac"),
            Some(&ColumnData::Float32(vec![0.5, 0.25, 0.0]))
        );
        assert_eq!(table.column("month"), Some(&ColumnData::Int32(vec![5, 5, 5])));
    }

    #[test]
    fn should_reject_misaligned_variables() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "precip/prism_precip_2016_5.tif", (1, 3), &[1.0, 2.0, 3.0]);
        write(root, "irrigated/irrigated_2016.tif", (3, 1), &[0.0, 1.0, 1.0]);
        write(root, "frac/rainfed_frac.tif", (1, 3), &[0.5, 0.25, 0.0]);

        assert!(build_table(&config(root), 2016, 5).is_err());
    }

    #[test]
    fn should_save_one_table_per_month() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for month in [5, 6] {
            let name = format!("precip/prism_precip_2016_{}.tif", month);
            write(root, &name, (2, 2), &[1.0, 2.0, 3.0, 4.0]);
        }
        write(root, "irrigated/irrigated_2016.tif", (2, 2), &[0.0, 1.0, 1.0, 0.0]);
        write(root, "frac/rainfed_frac.tif", (2, 2), &[0.5, 0.25, 0.0, 1.0]);

        let config = PipelineConfig {
            predictors: Some(config(root)),
            ..PipelineConfig::from_yaml("years: [2016]").unwrap()
        };
        let job = Job {
            config: &config,
            years: config.years.clone(),
            force: false,
        };

        let summary = predictors(&job, &mut MemoryCache::default()).unwrap();

        assert_eq!(summary.failed, 0);
        assert!(root.join("out/predictors_2016_5.parquet").exists());
        assert!(root.join("out/predictors_2016_6.parquet").exists());
    }
}
