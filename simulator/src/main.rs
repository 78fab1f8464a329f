mod background;
mod simulation_config;
mod source;
mod trial;
mod utils;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rayon::ThreadPool;
use rta_common::{
    ErrorScope, GrbTemplate, RtaResult, RunConfig, Seed,
    tracer::{TracerEngine, TracerOptions},
};
use rta_photometry::irf::{load_effective_area_table, resolve_irf_path};
use simulation_config::SimulationConfig;
use std::{fs::File, io::BufReader, path::PathBuf};
use tracing::{debug, error, info, level_filters::LevelFilter, warn};
use trial::{GrbRun, TrialReport, TrialResult, mean_elapsed, run_trials, simulate_background_trial};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Path to the JSON configuration file
    #[clap(short = 'f', long)]
    config: PathBuf,

    /// Simulate trials in parallel
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

#[derive(Debug, Clone, Copy, Subcommand)]
enum Mode {
    /// Simulate empty fields, one photon list per trial
    Background,
    /// Simulate each GRB template on top of the background
    Grb,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let tracer = TracerEngine::new(TracerOptions {
        fallback_level: args.log_level,
        ..TracerOptions::default()
    });
    debug!("Logging at level {}", tracer.level());

    let config: SimulationConfig = serde_json::from_reader(BufReader::new(
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

    let reports = match args.mode {
        Mode::Background => simulate_backgrounds(&config, pool.as_ref())?,
        Mode::Grb => simulate_grbs(&config, pool.as_ref())?,
    };
    match mean_elapsed(&reports) {
        Some(mean) => info!("Trial elapsed time (mean): {mean:?}"),
        None => warn!("No trial completed"),
    }
    info!("...done.");
    Ok(())
}

fn seeds(config: &SimulationConfig) -> Vec<Seed> {
    config.run.seeds().collect()
}

/// Splits trial results into reports, logging skipped trials. Returns the
/// first error whose scope reaches past a single trial.
fn collect_reports(results: Vec<TrialResult>) -> (Vec<TrialReport>, Option<trial::SimulatorError>) {
    let mut reports = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) if matches!(e.scope(), ErrorScope::Trial | ErrorScope::Step) => {
                warn!("Skipping trial: {e}")
            }
            Err(e) => return (reports, Some(e)),
        }
    }
    (reports, None)
}

fn simulate_backgrounds(config: &SimulationConfig, pool: Option<&ThreadPool>) -> anyhow::Result<Vec<TrialReport>> {
    info!("Simulate empty fields");
    let results = run_trials(seeds(config), pool, |seed| simulate_background_trial(config, seed));
    match collect_reports(results) {
        (reports, None) => Ok(reports),
        (_, Some(e)) => Err(e.into()),
    }
}

/// The template of `runid`, or `None` when it cannot be used and the run id
/// is skipped.
fn load_template(run: &RunConfig, runid: &str) -> RtaResult<Option<GrbTemplate>> {
    match GrbTemplate::load(&run.template_path(runid)) {
        Ok(template) => Ok(Some(template)),
        Err(e) if e.scope() != ErrorScope::Run => {
            warn!("Skip runid {runid}: {e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn simulate_grbs(config: &SimulationConfig, pool: Option<&ThreadPool>) -> anyhow::Result<Vec<TrialReport>> {
    let run = &config.run;
    let (caldbs, irfs) = (run.caldbs(), run.irfs());
    let (Some(caldb), Some(irf_name)) = (caldbs.first(), irfs.first()) else {
        anyhow::bail!("a caldb and an irf are required");
    };
    if caldbs.len() > 1 || irfs.len() > 1 {
        warn!("Simulating with {caldb}/{irf_name} only");
    }
    let irf = load_effective_area_table(&resolve_irf_path(&run.caldb_root, caldb, irf_name))?;
    let erange = irf.clamp_energy_range(run.energy_range())?;

    let mut reports = Vec::new();
    for runid in run.run_ids()? {
        info!("Processing runid: {runid}");
        let Some(template) = load_template(run, &runid)? else {
            continue;
        };
        let grb = GrbRun {
            config,
            runid: &runid,
            template: &template,
            irf: &irf,
            erange,
        };
        let results = run_trials(seeds(config), pool, |seed| grb.simulate_trial(seed));
        let (mut completed, failure) = collect_reports(results);
        reports.append(&mut completed);
        match failure {
            None => {}
            Some(e) if e.scope() == ErrorScope::Combination => warn!("Skip runid {runid}: {e}"),
            Some(e) => {
                error!("Aborting at runid {runid}");
                return Err(e.into());
            }
        }
    }
    Ok(reports)
}
