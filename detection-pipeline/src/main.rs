mod aperture;
mod blind_search;
mod config;
mod fit;
mod parameters;
mod run_matrix;
mod trials;
mod windows;

use anyhow::Context;
use aperture::ApertureAnalysis;
use blind_search::BlindSearch;
use clap::Parser;
use config::AnalysisConfig;
use fit::FileFitService;
use parameters::{ApertureParameters, BlindSearchParameters, Mode};
use rayon::ThreadPool;
use rta_common::{
    GrbTemplate, RtaResult, Seed,
    config::ensure_dir,
    log_row::LogFile,
    tracer::{TracerEngine, TracerOptions},
};
use rta_photometry::{
    SignificanceEngine,
    irf::{load_effective_area_table, resolve_irf_path},
};
use run_matrix::{Combination, combinations};
use std::{fs::File, io::BufReader, path::PathBuf, time::Instant};
use tracing::{debug, info, level_filters::LevelFilter};
use trials::{log_trials, run_trials, skip_combination};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Path to the JSON configuration file
    #[clap(short = 'f', long)]
    config: PathBuf,

    /// Analyse trials in parallel
    #[clap(long)]
    mp_enabled: bool,

    /// The size of the trial thread pool
    #[clap(long, default_value = "4")]
    mp_threads: usize,

    /// Log level used when RUST_LOG is not set
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    mode: Mode,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let tracer = TracerEngine::new(TracerOptions {
        fallback_level: args.log_level,
        ..TracerOptions::default()
    });
    debug!("Logging at level {}", tracer.level());

    let config: AnalysisConfig = serde_json::from_reader(BufReader::new(
        File::open(&args.config)
            .with_context(|| format!("cannot open {}", args.config.display()))?,
    ))
    .with_context(|| format!("cannot parse {}", args.config.display()))?;
    config.validate()?;

    let pool = if args.mp_enabled {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(args.mp_threads)
                .build()?,
        )
    } else {
        None
    };

    let start = Instant::now();
    for combination in combinations(&config.run)? {
        let name = format!(
            "{}/{}/{}",
            combination.runid, combination.caldb, combination.irf
        );
        info!("Processing {name}");
        let result = match &args.mode {
            Mode::Aperture(parameters) => {
                aperture_photometry(&config, parameters, &combination, pool.as_ref())
            }
            Mode::BlindSearch(parameters) => {
                blind_search(&config, parameters, &combination, pool.as_ref())
            }
        };
        if let Err(e) = result {
            skip_combination(&name, e)?;
        }
    }
    info!("...done in {:?}.", start.elapsed());
    Ok(())
}

fn seeds(config: &AnalysisConfig) -> Vec<Seed> {
    config.run.seeds().collect()
}

fn aperture_photometry(
    config: &AnalysisConfig,
    parameters: &ApertureParameters,
    combination: &Combination,
    pool: Option<&ThreadPool>,
) -> RtaResult<()> {
    let run = &config.run;
    let template = GrbTemplate::load(&run.template_path(&combination.runid))?;
    let irf = load_effective_area_table(&resolve_irf_path(
        &run.caldb_root,
        &combination.caldb,
        &combination.irf,
    ))?;
    let requested = parameters
        .energy_range
        .map(|range| range.0)
        .unwrap_or_else(|| run.energy_range());
    let erange = irf.clamp_energy_range(requested)?;
    let policy = parameters
        .policy
        .map(Into::into)
        .unwrap_or(config.significance_policy);

    let context = combination.row_context(run);
    let pipe = config.pipe();
    let analysis = ApertureAnalysis {
        config,
        context: &context,
        pipe: &pipe,
        irf: &irf,
        erange,
        target: template.target(),
        engine: SignificanceEngine::new(policy),
        save_off_regions: parameters.save_off_regions || config.save_off_regions,
    };

    ensure_dir(&run.outputs_dir(&combination.runid))?;
    let mut log = LogFile::create(&combination.aperture_log(run, &pipe))?;
    let results = run_trials(seeds(config), pool, |seed| analysis.analyse_trial(seed));
    let completed = log_trials(&mut log, results)?;
    info!(
        "{completed} trials, {} rows logged to {}",
        log.rows(),
        log.path().display()
    );
    Ok(())
}

fn blind_search(
    config: &AnalysisConfig,
    parameters: &BlindSearchParameters,
    combination: &Combination,
    pool: Option<&ThreadPool>,
) -> RtaResult<()> {
    let run = &config.run;
    let erange = parameters
        .energy_range
        .map(|range| range.0)
        .unwrap_or_else(|| run.energy_range());
    let context = combination.row_context(run);
    let fits = FileFitService { run };
    let search = BlindSearch {
        config,
        context: &context,
        fits: &fits,
        erange,
    };

    ensure_dir(&run.outputs_dir(&combination.runid))?;
    let mut log = LogFile::create(&combination.blind_search_log(run))?;
    let results = run_trials(seeds(config), pool, |seed| search.analyse_trial(seed));
    let completed = log_trials(&mut log, results)?;
    info!(
        "{completed} trials, {} rows logged to {}",
        log.rows(),
        log.path().display()
    );
    Ok(())
}
