//! Time-resolved GRB spectral templates.
//!
//! A template gives the burst position and a sequence of time slices, each
//! with its own power-law spectrum. The physics behind the slices is not
//! modelled here; the slices are simply replayed by the simulator.

use crate::{Gti, RtaError, RtaResult, SkyCoord, Time};
use serde::Deserialize;
use std::{fs::File, io::BufReader, path::Path};

/// One time bin of a template, with a power law
/// `dN/dE = prefactor * (E / pivot)^index` in ph/cm²/s/MeV.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TemplateSlice {
    pub start: Time,
    pub stop: Time,
    pub prefactor: f64,
    pub index: f64,
    /// MeV
    pub pivot: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GrbTemplate {
    pub ra: f64,
    pub dec: f64,
    pub time_slices: Vec<TemplateSlice>,
}

/// A template slice clipped to the requested GTI.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSlice<'a> {
    pub gti: Gti,
    pub spectrum: &'a TemplateSlice,
}

impl GrbTemplate {
    pub fn load(path: &Path) -> RtaResult<Self> {
        if !path.is_file() {
            return Err(RtaError::MissingInput(path.to_owned()));
        }
        let template: GrbTemplate = serde_json::from_reader(BufReader::new(File::open(path)?))
            .map_err(|source| RtaError::Json {
                path: path.to_owned(),
                source,
            })?;
        template.validate(path)?;
        Ok(template)
    }

    fn validate(&self, path: &Path) -> RtaResult<()> {
        let ordered = self
            .time_slices
            .windows(2)
            .all(|pair| matches!(pair, [a, b] if a.stop <= b.start));
        let non_empty = self.time_slices.iter().all(|slice| slice.start < slice.stop);
        if ordered && non_empty {
            Ok(())
        } else {
            Err(RtaError::Template {
                path: path.to_owned(),
                message: "time slices are empty or unordered".to_owned(),
            })
        }
    }

    pub fn target(&self) -> SkyCoord {
        SkyCoord::new(self.ra, self.dec)
    }

    /// The template slices overlapping `gti`, with their boundaries clipped
    /// to it, in time order.
    pub fn time_slices(&self, gti: &Gti) -> Vec<TimeSlice<'_>> {
        self.time_slices
            .iter()
            .filter(|slice| slice.stop > gti.start && slice.start < gti.stop)
            .map(|slice| TimeSlice {
                gti: Gti::new(slice.start.max(gti.start), slice.stop.min(gti.stop)),
                spectrum: slice,
            })
            .collect()
    }
}

/// Reads only the target position of a template.
pub fn get_target_pointing(template: &Path) -> RtaResult<SkyCoord> {
    GrbTemplate::load(template).map(|template| template.target())
}
