use crate::{
    background::simulate_background,
    simulation_config::SimulationConfig,
    source::SourceSimulator,
    utils::DistributionError,
};
use rand::{SeedableRng, rngs::StdRng};
use rayon::{
    ThreadPool,
    iter::{IntoParallelIterator, ParallelIterator},
};
use rta_common::{
    ErrorCodeLocation, ErrorScope, EventList, GrbTemplate, Gti, RtaError, Seed, SkyCoord, Time,
    config::{ensure_dir, trial_name},
};
use rta_photometry::ResponseTable;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub(crate) enum SimulatorError {
    #[error("{0}")]
    Rta(#[from] RtaError),
    #[error("{0}")]
    Distribution(#[from] DistributionError),
}

impl SimulatorError {
    pub(crate) fn scope(&self) -> ErrorScope {
        match self {
            Self::Rta(e) => e.scope(),
            Self::Distribution(_) => ErrorScope::Run,
        }
    }
}

pub(crate) type TrialResult = Result<TrialReport, SimulatorError>;

#[derive(Debug, Clone)]
pub(crate) struct TrialReport {
    pub(crate) seed: Seed,
    pub(crate) events: usize,
    pub(crate) elapsed: Duration,
}

/// Runs `trial` for every seed, on `pool` when one is given. Results are in
/// seed order either way.
pub(crate) fn run_trials<F>(seeds: Vec<Seed>, pool: Option<&ThreadPool>, trial: F) -> Vec<TrialResult>
where
    F: Fn(Seed) -> TrialResult + Sync + Send,
{
    match pool {
        Some(pool) => pool.install(|| seeds.into_par_iter().map(&trial).collect()),
        None => seeds.into_iter().map(trial).collect(),
    }
}

pub(crate) fn mean_elapsed(reports: &[TrialReport]) -> Option<Duration> {
    let total = reports.iter().map(|report| report.elapsed).sum::<Duration>();
    u32::try_from(reports.len())
        .ok()
        .filter(|&n| n > 0)
        .map(|n| total / n)
}

#[instrument(skip(config))]
pub(crate) fn simulate_background_trial(config: &SimulationConfig, seed: Seed) -> TrialResult {
    let start = Instant::now();
    let run = &config.run;
    let mut rng = StdRng::seed_from_u64(seed.into());
    let pointing = config.background_pointing(seed)?;
    let gti = Gti::new(0.0, run.tobs);

    let events = simulate_background(
        &mut rng,
        &config.background,
        pointing,
        run.roi,
        run.energy_range(),
        gti,
    )?;
    let list = EventList::new(pointing, gti, events);

    let directory = run.background_dir();
    ensure_dir(&directory)?;
    list.save(&directory.join(format!("{}.json", trial_name("bkg", seed))))?;

    let report = TrialReport {
        seed,
        events: list.len(),
        elapsed: start.elapsed(),
    };
    info!("Trial {seed} took {:?}", report.elapsed);
    Ok(report)
}

/// Everything shared by the trials of one GRB.
pub(crate) struct GrbRun<'a> {
    pub(crate) config: &'a SimulationConfig,
    pub(crate) runid: &'a str,
    pub(crate) template: &'a GrbTemplate,
    pub(crate) irf: &'a ResponseTable,
    pub(crate) erange: (f64, f64),
}

impl GrbRun<'_> {
    fn background_list(&self, rng: &mut StdRng, pointing: SkyCoord, gti: Gti) -> Result<EventList, SimulatorError> {
        let run = &self.config.run;
        let events = simulate_background(rng, &self.config.background, pointing, run.roi, self.erange, gti)?;
        Ok(EventList::new(pointing, gti, events))
    }

    /// Simulates the burst over the observation, shifted by the onset when
    /// there is one, and saves the merged photon list.
    #[instrument(skip(self), fields(runid = self.runid))]
    pub(crate) fn simulate_trial(&self, seed: Seed) -> TrialResult {
        let start = Instant::now();
        let run = &self.config.run;
        let mut rng = StdRng::seed_from_u64(seed.into());
        let target = self.template.target();
        let pointing = run.resolve_pointing(self.runid, target, seed)?;

        let delay: Time = match &self.config.random_delay {
            Some(random_delay) => random_delay.sample(&mut rng)?,
            None => run.delay,
        };
        if run.onset != 0.0 && delay != 0.0 {
            return Err(RtaError::configuration(
                "either \"onset\" or \"delay\" must be equal to 0",
                ErrorCodeLocation::SimulateGrb,
            )
            .into());
        }
        let tmax = run.tobs - run.onset + delay;
        let slices = self.template.time_slices(&Gti::new(delay, tmax));
        debug!("Simulating {} time slices with delay {delay} s", slices.len());

        let source = SourceSimulator::new(
            self.irf,
            &self.config.source,
            target,
            pointing,
            self.erange,
            run.scale_flux_factor,
        );
        let mut lists = Vec::with_capacity(slices.len() + 1);
        for slice in &slices {
            let mut list = self.background_list(&mut rng, pointing, slice.gti)?;
            list.events.extend(source.simulate(&mut rng, slice)?);
            lists.push(list);
        }
        if run.onset != 0.0 {
            for list in &mut lists {
                list.shift_time(run.onset);
            }
            let before_onset = self.background_list(&mut rng, pointing, Gti::new(0.0, run.onset))?;
            lists.insert(0, before_onset);
        }

        let merged = EventList::merge(pointing, lists, Gti::new(delay, delay + run.tobs));
        let directory = run.obs_dir(self.runid);
        ensure_dir(&directory)?;
        merged.save(&directory.join(format!("{}.json", trial_name("ebl", seed))))?;

        let report = TrialReport {
            seed,
            events: merged.len(),
            elapsed: start.elapsed(),
        };
        info!("Trial {seed} took {:?}", report.elapsed);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rta_common::Event;
    use std::path::Path;

    const TARGET: SkyCoord = SkyCoord { ra: 33.0, dec: 20.0 };

    const TEMPLATE: &str = r#"
    {
        "ra": 33.0, "dec": 20.0,
        "time-slices": [
            { "start": 0,  "stop": 50,  "prefactor": 1e-10, "index": -2.0, "pivot": 1000000 },
            { "start": 50, "stop": 500, "prefactor": 5e-11, "index": -2.5, "pivot": 1000000 }
        ]
    }
    "#;

    /// A point-like source (no PSF smearing) on top of a background over
    /// the field of view.
    fn config(data: &Path, extra: &str) -> SimulationConfig {
        serde_json::from_str(&format!(
            r#"{{
                "data": "{}", "catalog": "/catalog", "caldb-root": "/caldb",
                "runid": "grb", "caldb": "prod5", "irf": "South",
                "trials": 1, "offset": 0.5, "tobs": 100,
                "emin": 0.1, "emax": 1.0, "roi": 2.5,
                "background": {{ "rate": 0.05, "index": -2.7 }},
                "source": {{ "psf": 0.0, "nbin": 100 }}
                {extra}
            }}"#,
            data.display()
        ))
        .unwrap()
    }

    fn irf() -> ResponseTable {
        ResponseTable::new(
            &[0.01, 1.0],
            &[1.0, 100.0],
            &[0.0, 2.0],
            &[2.0, 4.0],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        )
        .unwrap()
    }

    fn simulate(config: &SimulationConfig, seed: Seed) -> EventList {
        let (template, irf) = (serde_json::from_str::<GrbTemplate>(TEMPLATE).unwrap(), irf());
        let grb = GrbRun {
            config,
            runid: "grb",
            template: &template,
            irf: &irf,
            erange: (0.1, 1.0),
        };
        let report = grb.simulate_trial(seed).unwrap();
        let list = EventList::load(
            &config
                .run
                .obs_dir("grb")
                .join(format!("{}.json", trial_name("ebl", seed))),
        )
        .unwrap();
        assert_eq!(report.events, list.len());
        list
    }

    fn is_source(event: &Event) -> bool {
        event.position() == TARGET
    }

    #[test]
    fn onset_prepends_a_background_only_segment() {
        let data = std::env::temp_dir().join("rta-simulate-onset");
        let config = config(&data, r#", "onset": 40"#);
        let list = simulate(&config, 1);

        assert_eq!(list.gti, Gti::new(0.0, 100.0));
        assert_eq!(list.pointing, SkyCoord::new(33.0, 20.5));
        assert!(list.events.iter().all(|e| list.gti.contains(e.time)));

        let (before, after): (Vec<&Event>, Vec<&Event>) =
            list.events.iter().partition(|e| e.time < 40.0);
        assert!(!before.is_empty());
        assert!(before.iter().all(|e| !is_source(e)));
        assert!(after.iter().any(|e| is_source(e)));
        std::fs::remove_dir_all(&data).unwrap();
    }

    #[test]
    fn delay_moves_the_observation_window() {
        let data = std::env::temp_dir().join("rta-simulate-delay");
        let config = config(&data, r#", "delay": 30"#);
        let list = simulate(&config, 2);

        assert_eq!(list.gti, Gti::new(30.0, 130.0));
        assert!(list.events.iter().all(|e| (30.0..130.0).contains(&e.time)));
        assert!(list.events.iter().any(is_source));
        assert!(list.events.windows(2).all(|pair| matches!(pair, [a, b] if a.time <= b.time)));
        std::fs::remove_dir_all(&data).unwrap();
    }

    #[test]
    fn random_delay_with_onset_is_a_configuration_error() {
        let data = std::env::temp_dir().join("rta-simulate-random-delay");
        let config = config(
            &data,
            r#", "onset": 40, "random-delay": {
                "slew": { "random-type": "constant", "value": 10 },
                "latency": { "random-type": "constant", "value": 0 }
            }"#,
        );
        let (template, irf) = (serde_json::from_str::<GrbTemplate>(TEMPLATE).unwrap(), irf());
        let grb = GrbRun {
            config: &config,
            runid: "grb",
            template: &template,
            irf: &irf,
            erange: (0.1, 1.0),
        };
        let error = grb.simulate_trial(1).unwrap_err();
        assert_eq!(error.scope(), ErrorScope::Run);
        assert!(!data.join("obs").join("grb").join("ebl000001.json").exists());
    }

    #[test]
    fn same_seed_same_events() {
        let data = std::env::temp_dir().join("rta-simulate-seeds");
        let config = config(&data, "");
        let first = simulate(&config, 5);
        let again = simulate(&config, 5);
        let other = simulate(&config, 6);
        assert_eq!(first.events, again.events);
        assert_eq!(first.gti, again.gti);
        assert_ne!(first.events, other.events);
        std::fs::remove_dir_all(&data).unwrap();
    }

    #[test]
    fn background_trial_is_saved_per_seed() {
        let data = std::env::temp_dir().join("rta-simulate-background");
        let config = config(&data, "");
        let report = simulate_background_trial(&config, 3).unwrap();
        let list = EventList::load(&config.run.background_dir().join("bkg000003.json")).unwrap();
        assert_eq!(report.events, list.len());
        assert!(!list.is_empty());
        assert_eq!(list.gti, Gti::new(0.0, 100.0));
        assert_eq!(list.pointing, SkyCoord::new(0.0, 0.5));
        assert!(list.events.iter().all(|e| list.gti.contains(e.time)));
        std::fs::remove_dir_all(&data).unwrap();
    }

    fn report(seed: Seed, millis: u64) -> TrialReport {
        TrialReport {
            seed,
            events: 0,
            elapsed: Duration::from_millis(millis),
        }
    }

    #[test]
    fn trials_keep_seed_order() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let seeds = (1..=32).collect::<Vec<_>>();
        let parallel = run_trials(seeds.clone(), Some(&pool), |seed| Ok(report(seed, 1)));
        let serial = run_trials(seeds.clone(), None, |seed| Ok(report(seed, 1)));
        let order = |results: Vec<TrialResult>| {
            results
                .into_iter()
                .map(|result| result.map(|report| report.seed).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(order(parallel), seeds);
        assert_eq!(order(serial), seeds);
    }

    #[test]
    fn mean_of_reports() {
        assert_eq!(mean_elapsed(&[]), None);
        assert_eq!(
            mean_elapsed(&[report(1, 100), report(2, 300)]),
            Some(Duration::from_millis(200))
        );
    }

    #[test]
    fn distribution_errors_abort() {
        let error = SimulatorError::from(DistributionError::Uniform(2.0, 1.0));
        assert_eq!(error.scope(), ErrorScope::Run);
        let error = SimulatorError::from(RtaError::MissingInput("ebl000001.json".into()));
        assert_eq!(error.scope(), ErrorScope::Trial);
    }
}
