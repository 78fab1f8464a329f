//! Results of the external maximum-likelihood fitter.

use rta_common::{RtaError, RtaResult, RunConfig, Seed, Time, config::trial_name};
use serde::Deserialize;
use std::{fs::File, io::BufReader, path::PathBuf};

/// One source candidate with its fitted power law. The prefactor is in
/// ph/cm²/s/MeV at `pivot` MeV.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct FitCandidate {
    pub(crate) ra: f64,
    pub(crate) dec: f64,
    pub(crate) ts: f64,
    pub(crate) index: f64,
    pub(crate) prefactor: f64,
    pub(crate) pivot: f64,
    pub(crate) prefactor_error: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct FitResult {
    #[serde(default)]
    candidates: Vec<FitCandidate>,
}

pub(crate) trait FitService: Sync {
    /// The most significant candidate fitted to `texp` seconds of a trial,
    /// if the fitter found any.
    fn best_candidate(&self, runid: &str, seed: Seed, texp: Time) -> RtaResult<Option<FitCandidate>>;
}

/// Reads the fit results the external fitter leaves next to the other
/// per-trial products.
pub(crate) struct FileFitService<'a> {
    pub(crate) run: &'a RunConfig,
}

impl FileFitService<'_> {
    pub(crate) fn path(&self, runid: &str, seed: Seed, texp: Time) -> PathBuf {
        self.run
            .products_dir(runid)
            .join(format!("texp{texp}s_{}_fit.json", trial_name("ebl", seed)))
    }
}

impl FitService for FileFitService<'_> {
    fn best_candidate(&self, runid: &str, seed: Seed, texp: Time) -> RtaResult<Option<FitCandidate>> {
        let path = self.path(runid, seed, texp);
        if !path.is_file() {
            return Err(RtaError::MissingInput(path));
        }
        let result: FitResult = serde_json::from_reader(BufReader::new(File::open(&path)?))
            .map_err(|source| RtaError::Json { path, source })?;
        Ok(result
            .candidates
            .into_iter()
            .max_by(|a, b| a.ts.total_cmp(&b.ts)))
    }
}
