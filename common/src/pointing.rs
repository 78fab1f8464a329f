use crate::{Degrees, RtaError, RtaResult, SkyCoord};
use serde::Deserialize;
use std::{fmt::Display, fs::File, io::BufReader, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AlertKeyword {
    #[serde(rename = "gw", alias = "GW")]
    Gw,
}

/// Either a fixed declination offset from the target, or `"gw"` to point at
/// the peak of the gravitational-wave localisation map.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Offset {
    Degrees(Degrees),
    Alert(AlertKeyword),
}

impl Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Offset::Degrees(offset) => write!(f, "{offset}"),
            Offset::Alert(AlertKeyword::Gw) => write!(f, "GW"),
        }
    }
}

fn default_wobble_offset() -> Degrees {
    0.5
}

fn default_clockwise() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Wobble {
    #[serde(default = "default_wobble_offset")]
    pub offset: Degrees,
    #[serde(default = "default_clockwise")]
    pub clockwise: bool,
}

impl Default for Wobble {
    fn default() -> Self {
        Self {
            offset: default_wobble_offset(),
            clockwise: default_clockwise(),
        }
    }
}

/// Shifts the pointing away from the target in declination, towards the
/// equator for southern targets.
pub fn offset_pointing(target: SkyCoord, offset: Degrees) -> SkyCoord {
    if target.dec < 0.0 {
        SkyCoord::new(target.ra, target.dec - offset)
    } else {
        SkyCoord::new(target.ra, target.dec + offset)
    }
}

/// Cycles through the four wobble positions around the target, one per run.
pub fn wobble_pointing(target: SkyCoord, run: u32, wobble: &Wobble) -> SkyCoord {
    let o = wobble.offset;
    let positions = if wobble.clockwise {
        [(0.0, o), (-o, 0.0), (0.0, -o), (o, 0.0)]
    } else {
        [(0.0, o), (o, 0.0), (0.0, -o), (-o, 0.0)]
    };
    let (dra, ddec) = positions
        .get(run as usize % positions.len())
        .copied()
        .unwrap_or_default();
    SkyCoord::new(target.ra + dra, target.dec + ddec)
}

/// File holding the localisation peak of a merger, as produced by the skymap
/// lookup service. `run0406_ID000126` maps to `run0406_MergerID000126_alert.json`.
pub fn alert_file_name(runid: &str) -> String {
    match runid.split_once('_') {
        Some((run, merger)) => format!("{run}_Merger{merger}_alert.json"),
        None => format!("{runid}_alert.json"),
    }
}

pub fn alert_pointing(merger_dir: &Path, runid: &str) -> RtaResult<SkyCoord> {
    let path = merger_dir.join(alert_file_name(runid));
    if !path.is_file() {
        return Err(RtaError::CalibrationLookup(format!(
            "merger alert for runid {runid} not found in {}",
            merger_dir.display()
        )));
    }
    serde_json::from_reader(BufReader::new(File::open(&path)?))
        .map_err(|source| RtaError::Json { path, source })
}
