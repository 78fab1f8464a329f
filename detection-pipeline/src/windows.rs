//! Time windows analysed for one configured exposure.

use crate::config::AnalysisConfig;
use rta_common::{RtaError, RtaResult, Time};
use rta_photometry::exposure::{generate, lightcurve_bins};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WindowPlan {
    /// Cumulative windows `[start, start + checkpoint)`, evaluated in order
    /// until a detection.
    Cumulative { start: Time, checkpoints: Vec<Time> },
    /// Independent consecutive bins.
    Lightcurve(Vec<(Time, Time)>),
    Single((Time, Time)),
}

impl WindowPlan {
    /// The plan for `exposure` seconds of an observation starting at `start`.
    pub(crate) fn new(config: &AnalysisConfig, exposure: Time, start: Time) -> RtaResult<Self> {
        let tobs = config.run.tobs;
        if config.cumulative {
            Ok(Self::Cumulative {
                start,
                checkpoints: generate(exposure, tobs, config.growth)?,
            })
        } else if config.lightcurve {
            let bins = lightcurve_bins(start, tobs, exposure)?;
            if bins.is_empty() {
                return Err(RtaError::Exposure(format!(
                    "no {exposure} s bin fits between {start} s and {tobs} s"
                )));
            }
            Ok(Self::Lightcurve(bins))
        } else {
            Ok(Self::Single((start, start + exposure)))
        }
    }

    /// Every window of the plan, ignoring the stopping rule.
    pub(crate) fn windows(&self) -> Vec<(Time, Time)> {
        match self {
            Self::Cumulative { start, checkpoints } => checkpoints
                .iter()
                .map(|&checkpoint| (*start, start + checkpoint))
                .collect(),
            Self::Lightcurve(bins) => bins.clone(),
            Self::Single(window) => vec![*window],
        }
    }
}
