//! Blind-search rows: the best candidate of the external fit for every
//! exposure of a trial, with its spectrum integrated over the analysis range.

use crate::{config::AnalysisConfig, fit::FitService};
use rta_common::{
    RtaResult, Seed, Time,
    log_row::{BlindSearchRow, RowContext},
};
use rta_photometry::{AdaptiveExposure, EnergyUnit, exposure::generate, flux::integrated_photon_flux};
use tracing::{debug, instrument};

pub(crate) struct BlindSearch<'a, S: FitService> {
    pub(crate) config: &'a AnalysisConfig,
    pub(crate) context: &'a RowContext,
    pub(crate) fits: &'a S,
    /// TeV
    pub(crate) erange: (f64, f64),
}

impl<'a, S: FitService> BlindSearch<'a, S> {
    #[instrument(skip(self), fields(runid = %self.context.runid))]
    pub(crate) fn analyse_trial(&self, seed: Seed) -> RtaResult<Vec<BlindSearchRow<'a>>> {
        let mut rows = Vec::new();
        for &exposure in &self.config.exposure {
            if self.config.cumulative {
                let checkpoints = generate(exposure, self.config.run.tobs, self.config.growth)?;
                let mut ladder = AdaptiveExposure::new(checkpoints, self.config.sigma_threshold);
                while let Some(texp) = ladder.current() {
                    let row = self.row(seed, texp)?;
                    ladder.record(row.sqrt_ts);
                    rows.push(row);
                }
                debug!("Seed {seed} ladder from {exposure} s {}", ladder.state());
            } else {
                rows.push(self.row(seed, exposure)?);
            }
        }
        Ok(rows)
    }

    fn row(&self, seed: Seed, texp: Time) -> RtaResult<BlindSearchRow<'a>> {
        let candidate = self.fits.best_candidate(&self.context.runid, seed, texp)?;
        let row = match candidate {
            Some(candidate) => {
                let flux = |k0| {
                    integrated_photon_flux(
                        candidate.index,
                        k0,
                        candidate.pivot,
                        self.erange,
                        EnergyUnit::Tev,
                    )
                };
                BlindSearchRow {
                    context: self.context,
                    seed,
                    texp,
                    // NaN for a negative TS
                    sqrt_ts: candidate.ts.sqrt(),
                    flux: flux(candidate.prefactor),
                    flux_err: flux(candidate.prefactor_error),
                    ra: candidate.ra,
                    dec: candidate.dec,
                }
            }
            None => {
                debug!("No candidate for seed {seed} at {texp} s");
                BlindSearchRow {
                    context: self.context,
                    seed,
                    texp,
                    sqrt_ts: f64::NAN,
                    flux: f64::NAN,
                    flux_err: f64::NAN,
                    ra: f64::NAN,
                    dec: f64::NAN,
                }
            }
        };
        Ok(row)
    }
}
