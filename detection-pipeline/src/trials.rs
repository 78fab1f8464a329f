use rayon::{
    ThreadPool,
    iter::{IntoParallelIterator, ParallelIterator},
};
use rta_common::{
    ErrorScope, RtaError, RtaResult, Seed,
    log_row::{LogFile, LogRow},
};
use tracing::{debug, warn};

/// Analyses every seed, on `pool` when one is given. Results are in seed
/// order either way.
pub(crate) fn run_trials<T, F>(seeds: Vec<Seed>, pool: Option<&ThreadPool>, trial: F) -> Vec<(Seed, RtaResult<T>)>
where
    T: Send,
    F: Fn(Seed) -> RtaResult<T> + Sync + Send,
{
    let run = |seed: Seed| (seed, trial(seed));
    match pool {
        Some(pool) => pool.install(|| seeds.into_par_iter().map(run).collect()),
        None => seeds.into_iter().map(run).collect(),
    }
}

/// Appends the rows of each trial in seed order, skipping failed trials.
///
/// Stops at the first error whose scope reaches past a single trial, after
/// the rows of the preceding trials have been written.
pub(crate) fn log_trials<R: LogRow>(log: &mut LogFile<R>, results: Vec<(Seed, RtaResult<Vec<R>>)>) -> RtaResult<usize> {
    let mut completed = 0;
    for (seed, result) in results {
        match result {
            Ok(rows) => {
                for row in &rows {
                    log.append(row)?;
                }
                completed += 1;
            }
            Err(e) if matches!(e.scope(), ErrorScope::Trial | ErrorScope::Step) => {
                warn!("Skipping trial {seed}: {e}")
            }
            Err(e) => return Err(e),
        }
    }
    debug!("{} rows in {}", log.rows(), log.path().display());
    Ok(completed)
}

/// Classifies a failed combination: `Ok` when the batch can move on to the
/// next one.
pub(crate) fn skip_combination(name: &str, error: RtaError) -> RtaResult<()> {
    if error.scope() == ErrorScope::Run {
        Err(error)
    } else {
        warn!("Skip {name}: {error}");
        Ok(())
    }
}
