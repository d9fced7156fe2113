//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::aggregate::{InvalidWindowPolicy, MissingPolicy, Reducer};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    /// Pipeline configuration file
    #[arg(long, short, global = true, env = "PEFF_CONFIG", default_value = "peff.yaml")]
    pub config: PathBuf,

    /// Years to process, overriding the configured list
    #[arg(long, global = true, value_delimiter = ',')]
    pub years: Option<Vec<u16>>,

    /// Recompute outputs already recorded in the cache
    #[arg(long, global = true)]
    pub force: bool,

    /// Do not read or write the result cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sum monthly rasters over each cell's growing season
    SeasonSum(SeasonArgs),
    /// Sum all monthly rasters of a year, masked by a yearly raster
    SeasonTotal,
    /// Compile monthly rasters of a year into one multi-band raster
    Bundle,
    /// Fill years without land-cover data by majority vote over other years
    FillYears,
    /// Select rainfed training cells inside the training zones
    TrainingFilter,
    /// Flatten rasters into monthly predictor tables
    Predictors,
}

/// Overrides for the configured aggregation policies.
#[derive(Args, Debug, Default)]
pub struct SeasonArgs {
    #[arg(long, value_enum)]
    pub reducer: Option<Reducer>,

    #[arg(long, value_enum)]
    pub missing: Option<MissingPolicy>,

    #[arg(long, value_enum)]
    pub invalid_window: Option<InvalidWindowPolicy>,
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    let style = ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

    ProgressBar::new(size).with_message(message).with_style(style)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_global_options() {
        let cli = Cli::try_parse_from([
            "peff",
            "season-sum",
            "--config",
            "west.yaml",
            "--years",
            "2016,2017",
            "--invalid-window",
            "empty",
            "--force",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("west.yaml"));
        assert_eq!(cli.years, Some(vec![2016, 2017]));
        assert!(cli.force);
        assert!(!cli.no_cache);
        match cli.command {
            Commands::SeasonSum(args) => {
                assert_eq!(args.invalid_window, Some(InvalidWindowPolicy::Empty));
                assert_eq!(args.reducer, None);
            }
            _ => panic!("expected season-sum"),
        }
    }

    #[test]
    fn should_create_progress_bar() {
        let pb = create_progress_bar(12, "Summing".to_string());
        pb.inc(3);

        assert_eq!(pb.length(), Some(12));
        assert_eq!(pb.position(), 3);
    }
}
