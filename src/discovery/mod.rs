//! Resolves a directory and the pipeline's naming convention
//! (`<name>_<year>.tif`, `<name>_<year>_<month>.tif`) to raster paths.

pub mod file_properties;

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};

pub use file_properties::FileProperties;

#[derive(Debug, Clone, PartialEq)]
pub struct RasterFile {
    pub path: PathBuf,
    pub properties: FileProperties,
}

/// All `.tif` files directly under `dir`, sorted by path.
pub fn list_rasters(dir: &Path) -> Result<Vec<RasterFile>> {
    let entries = fs::read_dir(dir).with_context(|| format!("Cannot read directory {:?}", dir))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let properties = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(FileProperties::from_file);
        if let Some(properties) = properties {
            files.push(RasterFile { path, properties });
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}

/// Monthly rasters of `year`, ordered by month.
pub fn monthly_rasters(dir: &Path, year: u16) -> Result<Vec<(u8, PathBuf)>> {
    let mut months = BTreeMap::new();

    for file in list_rasters(dir)? {
        if file.properties.year != Some(year) {
            continue;
        }
        if let Some(month) = file.properties.month {
            if let Some(previous) = months.insert(month, file.path.clone()) {
                bail!(
                    "Month {} of {} matches both {:?} and {:?}",
                    month,
                    year,
                    previous,
                    file.path
                );
            }
        }
    }

    Ok(months.into_iter().collect())
}

pub fn monthly_raster(dir: &Path, year: u16, month: u8) -> Result<PathBuf> {
    monthly_rasters(dir, year)?
        .into_iter()
        .find(|(m, _)| *m == month)
        .map(|(_, path)| path)
        .ok_or_else(|| anyhow!("No raster for {}-{:02} in {:?}", year, month, dir))
}

/// The raster of `year` that carries no month.
pub fn yearly_raster(dir: &Path, year: u16) -> Result<PathBuf> {
    list_rasters(dir)?
        .into_iter()
        .find(|file| file.properties.year == Some(year) && file.properties.month.is_none())
        .map(|file| file.path)
        .ok_or_else(|| anyhow!("No raster for {} in {:?}", year, dir))
}

/// The first raster of a directory holding a single time-invariant layer.
pub fn static_raster(dir: &Path) -> Result<PathBuf> {
    list_rasters(dir)?
        .into_iter()
        .next()
        .map(|file| file.path)
        .ok_or_else(|| anyhow!("No raster in {:?}", dir))
}

// -- Tests -------------------------------------------------------------------
