//! Run configuration shared by the simulator and the detection pipeline.
//!
//! Both binaries read the same JSON document; each flattens this struct into
//! its own configuration type and adds the keys it alone needs.

use crate::{
    ErrorCodeLocation, RtaError, RtaResult, SkyCoord, Time,
    pointing::{Offset, Wobble, alert_pointing, offset_pointing, wobble_pointing},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub type Seed = u32;

/// Keys that accept either a single value or a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone + Ord> OneOrMany<T> {
    pub fn sorted(&self) -> Vec<T> {
        let mut values = match self {
            OneOrMany::One(value) => vec![value.clone()],
            OneOrMany::Many(values) => values.clone(),
        };
        values.sort();
        values
    }
}

fn default_scale_flux_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    /// Root of the `obs`, `rta_products` and `outputs` trees.
    pub data: PathBuf,
    /// Directory of GRB templates, one `<runid>.json` per burst.
    pub catalog: PathBuf,
    /// Directory of merger alert files, needed when `offset` is `"gw"`.
    #[serde(default)]
    pub merger: Option<PathBuf>,
    pub caldb_root: PathBuf,
    /// A run id, a list of them, or `"all"` for every template in `catalog`.
    pub runid: OneOrMany<String>,
    pub caldb: OneOrMany<String>,
    pub irf: OneOrMany<String>,
    pub trials: u32,
    #[serde(default)]
    pub start_count: u32,
    pub offset: Offset,
    #[serde(default)]
    pub wobble: Option<Wobble>,
    #[serde(default)]
    pub delay: Time,
    #[serde(default)]
    pub onset: Time,
    /// Total observation time (s).
    pub tobs: Time,
    /// TeV
    pub emin: f64,
    /// TeV
    pub emax: f64,
    /// Radius of the simulated field of view (deg).
    pub roi: f64,
    #[serde(default = "default_scale_flux_factor")]
    pub scale_flux_factor: f64,
}

impl RunConfig {
    pub fn validate(&self) -> RtaResult<()> {
        let fail = |message: &str| {
            Err(RtaError::configuration(
                message,
                ErrorCodeLocation::ValidateRunConfig,
            ))
        };
        if self.onset != 0.0 && self.delay != 0.0 {
            return fail("either \"onset\" or \"delay\" must be equal to 0");
        }
        if self.onset < 0.0 || self.delay < 0.0 {
            return fail("\"onset\" and \"delay\" must not be negative");
        }
        if !(self.tobs > 0.0) {
            return fail("\"tobs\" must be positive");
        }
        if self.onset >= self.tobs {
            return fail("\"onset\" must fall inside the observation");
        }
        if self.trials == 0 {
            return fail("\"trials\" must be at least 1");
        }
        if !(self.emin > 0.0 && self.emin < self.emax) {
            return fail("energy range must satisfy 0 < emin < emax");
        }
        if !(self.roi > 0.0) {
            return fail("\"roi\" must be positive");
        }
        if !self.data.is_dir() {
            return Err(RtaError::configuration(
                format!("data path {} is not a directory", self.data.display()),
                ErrorCodeLocation::ValidateRunConfig,
            ));
        }
        Ok(())
    }

    /// Sorted run ids, expanding `"all"` to the templates in the catalog.
    pub fn run_ids(&self) -> RtaResult<Vec<String>> {
        if self.runid == OneOrMany::One("all".to_owned()) {
            let pattern = self.catalog.join("*.json");
            let pattern = pattern.to_str().ok_or_else(|| {
                RtaError::configuration(
                    format!("catalog path {} is not valid UTF-8", self.catalog.display()),
                    ErrorCodeLocation::ListRunIds,
                )
            })?;
            let mut runids = Vec::new();
            for path in glob::glob(pattern)? {
                if let Some(stem) = path?.file_stem().and_then(|stem| stem.to_str()) {
                    runids.push(stem.to_owned());
                }
            }
            runids.sort();
            debug!("Found {} templates in catalog", runids.len());
            Ok(runids)
        } else {
            Ok(self.runid.sorted())
        }
    }

    pub fn caldbs(&self) -> Vec<String> {
        self.caldb.sorted()
    }

    pub fn irfs(&self) -> Vec<String> {
        self.irf.sorted()
    }

    /// Trial seeds, `start_count + 1 ..= start_count + trials`.
    pub fn seeds(&self) -> impl Iterator<Item = Seed> + use<> {
        let first = self.start_count + 1;
        first..first + self.trials
    }

    pub fn energy_range(&self) -> (f64, f64) {
        (self.emin, self.emax)
    }

    pub fn template_path(&self, runid: &str) -> PathBuf {
        self.catalog.join(format!("{runid}.json"))
    }

    pub fn obs_dir(&self, runid: &str) -> PathBuf {
        self.data.join("obs").join(runid)
    }

    pub fn background_dir(&self) -> PathBuf {
        self.data.join("obs").join("backgrounds")
    }

    pub fn products_dir(&self, runid: &str) -> PathBuf {
        self.data.join("rta_products").join(runid)
    }

    pub fn outputs_dir(&self, runid: &str) -> PathBuf {
        self.data.join("outputs").join(runid)
    }

    /// The instrument pointing for one trial of one run.
    ///
    /// A wobble strategy takes precedence; otherwise the pointing is either
    /// offset from the target or read from the merger alert.
    pub fn resolve_pointing(&self, runid: &str, target: SkyCoord, seed: Seed) -> RtaResult<SkyCoord> {
        match (&self.wobble, self.offset) {
            (Some(wobble), _) => Ok(wobble_pointing(target, seed, wobble)),
            (None, Offset::Degrees(offset)) => Ok(offset_pointing(target, offset)),
            (None, Offset::Alert(_)) => {
                let merger = self.merger.as_deref().ok_or_else(|| {
                    RtaError::configuration(
                        "\"merger\" is required when offset is \"gw\"",
                        ErrorCodeLocation::ResolvePointing,
                    )
                })?;
                alert_pointing(merger, runid)
            }
        }
    }
}

/// `ebl000042`-style file stem for a trial.
pub fn trial_name(prefix: &str, seed: Seed) -> String {
    format!("{prefix}{seed:06}")
}

pub fn ensure_dir(path: &Path) -> RtaResult<()> {
    if !path.is_dir() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
