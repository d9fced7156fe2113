//! Pipeline configuration loaded from YAML.
//!
//! Every job reads its own optional section; running a job whose section is
//! absent is an error. Paths are used as given.

use std::{
    collections::BTreeMap,
    fs,
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{AggregateOptions, InvalidWindowPolicy, MissingPolicy, Reducer},
    cache::JsonCache,
    raster::{ops::CDL_GRASS_PASTURE, DEFAULT_NODATA},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_nodata")]
    pub nodata: f32,
    #[serde(default)]
    pub years: Vec<u16>,
    #[serde(default)]
    pub cache: Option<PathBuf>,
    pub season: Option<SeasonConfig>,
    pub total: Option<TotalConfig>,
    pub bundle: Option<BundleConfig>,
    pub occurrence: Option<OccurrenceConfig>,
    pub training: Option<TrainingConfig>,
    pub predictors: Option<PredictorsConfig>,
}

/// Growing-season window-bounded sum of monthly rasters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonConfig {
    pub monthly_dir: PathBuf,
    #[serde(flatten)]
    pub window: WindowSource,
    pub output_dir: PathBuf,
    #[serde(default = "default_units")]
    pub units: usize,
    #[serde(default)]
    pub reducer: Reducer,
    #[serde(default)]
    pub missing: MissingPolicy,
    #[serde(default)]
    pub invalid_window: InvalidWindowPolicy,
}

/// Where the per-year start/end month rasters come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WindowSource {
    /// One raster per year, band 1 = start month, band 2 = end month.
    Banded { season_dir: PathBuf },
    /// Separate single-band start and end rasters per year.
    Split { start_dir: PathBuf, end_dir: PathBuf },
}

/// Whole-year sum masked by a yearly raster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalConfig {
    pub monthly_dir: PathBuf,
    pub mask_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Monthly rasters of a year compiled into one multi-band raster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    pub monthly_dir: PathBuf,
    pub output_dir: PathBuf,
    pub months: MonthRange,
}

/// Majority vote over source years, written out under target years.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceConfig {
    pub input_dir: PathBuf,
    pub source_years: Vec<u16>,
    pub target_years: Vec<u16>,
    pub reference: PathBuf,
    pub output_dir: PathBuf,
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub crop_et_dir: PathBuf,
    pub rainfed_dir: PathBuf,
    pub irrigated_dir: PathBuf,
    pub cdl_dir: PathBuf,
    pub excess_et_dir: PathBuf,
    pub zone_dir: PathBuf,
    pub output_dir: PathBuf,
    pub months: MonthRange,
    #[serde(default = "default_pasture_class")]
    pub pasture_class: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorsConfig {
    pub months: MonthRange,
    #[serde(default)]
    pub monthly: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub yearly: BTreeMap<String, PathBuf>,
    #[serde(default, rename = "static")]
    pub static_: BTreeMap<String, PathBuf>,
    pub include: Vec<String>,
    pub output_dir: PathBuf,
}

/// Inclusive calendar month range, written `[first, last]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u8; 2]", into = "[u8; 2]")]
pub struct MonthRange {
    pub first: u8,
    pub last: u8,
}

impl MonthRange {
    pub fn months(&self) -> RangeInclusive<u8> {
        self.first..=self.last
    }
}

impl TryFrom<[u8; 2]> for MonthRange {
    type Error = String;

    fn try_from([first, last]: [u8; 2]) -> Result<Self, Self::Error> {
        if !(1..=12).contains(&first) || !(1..=12).contains(&last) || first > last {
            return Err(format!("invalid month range [{}, {}]", first, last));
        }
        Ok(MonthRange { first, last })
    }
}

impl From<MonthRange> for [u8; 2] {
    fn from(range: MonthRange) -> Self {
        [range.first, range.last]
    }
}

fn default_nodata() -> f32 {
    DEFAULT_NODATA
}

fn default_units() -> usize {
    12
}

fn default_pasture_class() -> f32 {
    CDL_GRASS_PASTURE
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {:?}", path))?;
        let config = Self::from_yaml(&text).with_context(|| format!("Invalid config {:?}", path))?;

        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(text)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(season) = &self.season {
            if season.units == 0 {
                bail!("season.units must be at least 1");
            }
        }
        if let Some(occurrence) = &self.occurrence {
            if occurrence.source_years.is_empty() {
                bail!("occurrence.source_years is empty");
            }
        }
        if let Some(predictors) = &self.predictors {
            for name in &predictors.include {
                let known = predictors.monthly.contains_key(name)
                    || predictors.yearly.contains_key(name)
                    || predictors.static_.contains_key(name);
                if !known {
                    bail!("predictors.include names unknown variable `{}`", name);
                }
            }
        }

        Ok(())
    }

    /// Fails with the section's name when the job is not configured.
    pub fn section<'a, T>(section: Option<&'a T>, name: &str) -> Result<&'a T> {
        section.ok_or_else(|| anyhow!("No `{}` section in the configuration", name))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache.clone().unwrap_or_else(JsonCache::default_path)
    }
}

impl SeasonConfig {
    pub fn aggregate_options(&self, nodata: f32) -> AggregateOptions {
        AggregateOptions {
            reducer: self.reducer,
            missing: self.missing,
            invalid_window: self.invalid_window,
            nodata,
        }
    }
}
