//! Aperture photometry of one trial: on/off counting around the target,
//! Li & Ma significance and conversion of the excess into a flux.

use crate::{config::AnalysisConfig, windows::WindowPlan};
use rta_common::{
    ErrorScope, Event, EventList, RtaResult, Seed, SkyCoord, Time,
    config::{ensure_dir, trial_name},
    log_row::{AperturePhotometryRow, RowContext},
};
use rta_photometry::{
    AdaptiveExposure, EventSelection, RegionSet, ResponseTable, SignificanceEngine,
    count_regions, find_off_regions,
    flux::{excess_to_flux, integrated_effective_area},
};
use tracing::{debug, instrument, warn};

/// Everything shared by the trials of one run/caldb/irf combination.
pub(crate) struct ApertureAnalysis<'a> {
    pub(crate) config: &'a AnalysisConfig,
    pub(crate) context: &'a RowContext,
    pub(crate) pipe: &'a str,
    pub(crate) irf: &'a ResponseTable,
    pub(crate) erange: (f64, f64),
    pub(crate) target: SkyCoord,
    pub(crate) engine: SignificanceEngine,
    pub(crate) save_off_regions: bool,
}

/// Per-trial inputs of every counting step.
struct TrialInputs<'t> {
    seed: Seed,
    events: &'t [Event],
    regions: &'t RegionSet,
    effective_area: f64,
}

impl<'a> ApertureAnalysis<'a> {
    fn event_list(&self, seed: Seed) -> RtaResult<EventList> {
        let path = self
            .config
            .run
            .obs_dir(&self.context.runid)
            .join(format!("{}.json", trial_name("ebl", seed)));
        EventList::load(&path)
    }

    fn save_regions(&self, seed: Seed, regions: &RegionSet) -> RtaResult<()> {
        let directory = self.config.run.products_dir(&self.context.runid);
        ensure_dir(&directory)?;
        regions.write_ds9(&directory.join(format!("{}_off_regions.reg", trial_name("ebl", seed))))
    }

    /// Rows for every exposure of one trial, in the order they were computed.
    #[instrument(skip(self), fields(runid = %self.context.runid))]
    pub(crate) fn analyse_trial(&self, seed: Seed) -> RtaResult<Vec<AperturePhotometryRow<'a>>> {
        let list = self.event_list(seed)?;
        let pointing = self
            .config
            .run
            .resolve_pointing(&self.context.runid, self.target, seed)?;
        if pointing.separation(&list.pointing) > 1e-6 {
            warn!(
                "Event list was simulated at {}, analysing at {pointing}",
                list.pointing
            );
        }
        let regions = find_off_regions(
            &self.config.background,
            self.target,
            pointing,
            self.config.region_radius,
        )?;
        if self.save_off_regions {
            self.save_regions(seed, &regions)?;
        }

        let offset = self.target.separation(&pointing);
        let effective_area = integrated_effective_area(
            self.irf,
            offset,
            self.erange,
            self.config.index,
            self.config.nbin,
        );
        debug!("Effective area {effective_area} cm² at offset {offset}");

        let inputs = TrialInputs {
            seed,
            events: &list.events,
            regions: &regions,
            effective_area,
        };
        let mut rows = Vec::new();
        for &exposure in &self.config.exposure {
            let plan = match WindowPlan::new(self.config, exposure, list.gti.start) {
                Ok(plan) => plan,
                Err(e) if e.scope() == ErrorScope::Step => {
                    warn!("Skipping exposure {exposure} s: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match plan {
                WindowPlan::Cumulative { start, checkpoints } => {
                    rows.append(&mut self.ladder(&inputs, start, checkpoints));
                }
                plan => rows.extend(
                    plan.windows()
                        .into_iter()
                        .map(|window| self.evaluate(&inputs, window)),
                ),
            }
        }
        Ok(rows)
    }

    /// Evaluates growing windows until a detection or the last checkpoint.
    fn ladder(&self, inputs: &TrialInputs, start: Time, checkpoints: Vec<Time>) -> Vec<AperturePhotometryRow<'a>> {
        let mut ladder = AdaptiveExposure::new(checkpoints, self.config.sigma_threshold);
        let mut rows = Vec::new();
        while let Some(checkpoint) = ladder.current() {
            let row = self.evaluate(inputs, (start, start + checkpoint));
            ladder.record(row.sigma);
            rows.push(row);
        }
        debug!("Seed {} ladder {} after {} steps", inputs.seed, ladder.state(), rows.len());
        rows
    }

    fn evaluate(&self, inputs: &TrialInputs, (start, stop): (Time, Time)) -> AperturePhotometryRow<'a> {
        let selection = EventSelection::new(self.erange, (start, stop));
        let (on, off) = count_regions(inputs.events, inputs.regions, &selection);
        let result = self.engine.evaluate(on, &off, inputs.regions.alpha());
        if let Some(diagnostic) = result.diagnostic {
            debug!("Seed {} window [{start}, {stop}): {diagnostic}", inputs.seed);
        }
        AperturePhotometryRow {
            context: self.context,
            seed: inputs.seed,
            start,
            stop,
            sqrt_ts: f64::NAN,
            flux: excess_to_flux(result.excess, inputs.effective_area, stop - start),
            flux_err: f64::NAN,
            ra: self.target.ra,
            dec: self.target.dec,
            prefactor: f64::NAN,
            index: self.config.index,
            scale: f64::NAN,
            on: result.on,
            off: result.off,
            alpha: result.alpha,
            excess: result.excess,
            sigma: result.significance,
            pipe: self.pipe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rta_common::{Gti, RtaError, pointing::Offset};
    use rta_photometry::SignificancePolicy;
    use std::path::Path;

    const TARGET: SkyCoord = SkyCoord { ra: 33.0, dec: 20.0 };

    fn config(data: &Path, extra: &str) -> AnalysisConfig {
        serde_json::from_str(&format!(
            r#"{{
                "data": "{}", "catalog": "/catalog", "caldb-root": "/caldb",
                "runid": "grb", "caldb": "prod5", "irf": "South",
                "trials": 1, "offset": 1.0, "tobs": 100,
                "emin": 0.1, "emax": 1.0, "roi": 2.5,
                "exposure": [10, 50],
                "background": {{ "method": "reflection", "regions": 3 }}
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

    fn context() -> RowContext {
        RowContext {
            runid: "grb".to_owned(),
            offset: Offset::Degrees(1.0),
            delay: 0.0,
            scale_flux: 1.0,
            caldb: "prod5".to_owned(),
            irf: "South".to_owned(),
        }
    }

    /// 20 photons on the target in the first 10 s, 2 in each reflected region.
    fn write_event_list(config: &AnalysisConfig, regions: &RegionSet, seed: Seed) {
        let event = |position: SkyCoord, time: Time| Event {
            ra: position.ra,
            dec: position.dec,
            energy: 0.5,
            time,
        };
        let mut events = (0..20)
            .map(|n| event(TARGET, n as f64 * 0.5))
            .collect::<Vec<_>>();
        for region in &regions.off {
            events.push(event(region.center, 1.0));
            events.push(event(region.center, 30.0));
        }
        let pointing = config.run.resolve_pointing("grb", TARGET, seed).unwrap();
        let list = EventList::new(pointing, Gti::new(0.0, 100.0), events);
        let directory = config.run.obs_dir("grb");
        std::fs::create_dir_all(&directory).unwrap();
        list.save(&directory.join(format!("{}.json", trial_name("ebl", seed))))
            .unwrap();
    }

    fn analysis<'a>(config: &'a AnalysisConfig, context: &'a RowContext, irf: &'a ResponseTable) -> ApertureAnalysis<'a> {
        ApertureAnalysis {
            config,
            context,
            pipe: "rtatool1d",
            irf,
            erange: (0.1, 1.0),
            target: TARGET,
            engine: SignificanceEngine::new(SignificancePolicy::Strict),
            save_off_regions: false,
        }
    }

    #[test]
    fn single_windows_per_exposure() {
        let data = std::env::temp_dir().join("rta-aperture-single");
        let config = config(&data, "");
        let (context, irf) = (context(), irf());
        let pointing = config.run.resolve_pointing("grb", TARGET, 1).unwrap();
        let regions = find_off_regions(&config.background, TARGET, pointing, 0.2).unwrap();
        write_event_list(&config, &regions, 1);

        let rows = analysis(&config, &context, &irf).analyse_trial(1).unwrap();
        assert_eq!(rows.len(), 2);
        let (first, second) = (rows.first().unwrap(), rows.last().unwrap());
        assert_eq!((first.start, first.stop), (0.0, 10.0));
        assert_eq!((first.on, first.off), (20, 3));
        assert_eq!((second.on, second.off), (20, 6));
        assert_approx_eq!(first.alpha, 1.0 / 3.0);
        assert_approx_eq!(first.excess, 19.0);
        assert_approx_eq!(first.flux, 19.0 / 1e4 / 10.0, 1e-9);
        assert!(first.sigma > 5.0);
        assert_eq!(first.pipe, "rtatool1d");
        std::fs::remove_dir_all(&data).unwrap();
    }

    #[test]
    fn ladder_stops_at_first_detection() {
        let data = std::env::temp_dir().join("rta-aperture-ladder");
        let config = config(&data, r#", "cumulative": true, "exposure": [5]"#);
        let (context, irf) = (context(), irf());
        let pointing = config.run.resolve_pointing("grb", TARGET, 1).unwrap();
        let regions = find_off_regions(&config.background, TARGET, pointing, 0.2).unwrap();
        write_event_list(&config, &regions, 1);

        let rows = analysis(&config, &context, &irf).analyse_trial(1).unwrap();
        let last = rows.last().unwrap();
        assert!(last.sigma >= 5.0);
        assert!(rows.iter().rev().skip(1).all(|row| !(row.sigma >= 5.0)));
        assert!(last.stop < 100.0);
        std::fs::remove_dir_all(&data).unwrap();
    }

    #[test]
    fn missing_event_list_fails_the_trial() {
        let data = std::env::temp_dir().join("rta-aperture-missing");
        let config = config(&data, "");
        let (context, irf) = (context(), irf());
        let error = analysis(&config, &context, &irf).analyse_trial(7).unwrap_err();
        assert!(matches!(error, RtaError::MissingInput(_)));
    }

    #[test]
    fn oversized_regions_are_a_step_error() {
        let data = std::env::temp_dir().join("rta-aperture-geometry");
        let config = config(&data, r#", "region-radius": 0.6"#);
        let (context, irf) = (context(), irf());
        let pointing = config.run.resolve_pointing("grb", TARGET, 1).unwrap();
        let regions = find_off_regions(&config.background, TARGET, pointing, 0.2).unwrap();
        write_event_list(&config, &regions, 1);

        let error = analysis(&config, &context, &irf).analyse_trial(1).unwrap_err();
        assert!(matches!(error, RtaError::Geometry(_)));
        std::fs::remove_dir_all(&data).unwrap();
    }
}
