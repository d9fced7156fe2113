mod aggregate;
mod cache;
mod cli;
mod config;
mod discovery;
mod error;
mod parquet;
mod raster;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::{debug, error};

use cache::{JsonCache, MemoryCache, ResultCache};
use cli::{
    command::{self, Job, RunSummary},
    Cli, Commands,
};
use config::PipelineConfig;

fn main() -> ExitCode {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(summary) => {
            for path in &summary.saved {
                println!("File saved to `{}`", path.display());
            }
            if summary.cached > 0 {
                println!("{} outputs already up to date", summary.cached);
            }
            if summary.failed > 0 {
                eprintln!("Error: {} tasks failed", summary.failed);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<RunSummary> {
    let config = PipelineConfig::load(&cli.config)?;
    let job = Job {
        config: &config,
        years: cli.years.clone().unwrap_or_else(|| config.years.clone()),
        force: cli.force,
    };

    let mut cache: Box<dyn ResultCache> = if cli.no_cache {
        Box::new(MemoryCache::default())
    } else {
        let cache = JsonCache::open(&config.cache_path())?;
        debug!("{} cached outputs", cache.len());
        Box::new(cache)
    };

    let summary = match &cli.command {
        Commands::SeasonSum(args) => command::season_sum(&job, args, cache.as_mut()),
        Commands::SeasonTotal => command::season_total(&job, cache.as_mut()),
        Commands::Bundle => command::bundle(&job, cache.as_mut()),
        Commands::FillYears => command::fill_years(&job, cache.as_mut()),
        Commands::TrainingFilter => command::training_filter(&job, cache.as_mut()),
        Commands::Predictors => command::predictors(&job, cache.as_mut()),
    };

    // Saved even when the job failed part way.
    cache.save()?;

    summary
}
