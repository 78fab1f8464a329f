//! Effective-area lookups.
//!
//! Calibration files hold the effective area in m² on a grid of energy bins
//! (TeV) by off-axis bins (deg). Queries are interpolated bilinearly between
//! bin midpoints, clamped at the outermost nodes, and returned in cm².

use ndarray::Array2;
use rta_common::{Degrees, RtaError, RtaResult};
use serde::Deserialize;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

const SQUARE_METRE_TO_CM2: f64 = 1e4;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CalibrationFile {
    effective_area: Option<EffectiveAreaTable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct EffectiveAreaTable {
    energ_lo: Vec<f64>,
    energ_hi: Vec<f64>,
    theta_lo: Vec<f64>,
    theta_hi: Vec<f64>,
    /// One row per off-axis bin.
    effarea: Vec<Vec<f64>>,
}

/// `<root>/data/cta/<caldb>/bcf/<irf>/irf_file.json`
pub fn resolve_irf_path(caldb_root: &Path, caldb: &str, irf: &str) -> PathBuf {
    caldb_root
        .join("data")
        .join("cta")
        .join(caldb)
        .join("bcf")
        .join(irf)
        .join("irf_file.json")
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_effective_area_table(path: &Path) -> RtaResult<ResponseTable> {
    if !path.is_file() {
        return Err(RtaError::CalibrationLookup(format!(
            "calibration file {} not found",
            path.display()
        )));
    }
    let file: CalibrationFile = serde_json::from_reader(BufReader::new(File::open(path)?))
        .map_err(|source| RtaError::Json {
            path: path.to_owned(),
            source,
        })?;
    let table = file.effective_area.ok_or_else(|| {
        RtaError::CalibrationLookup(format!(
            "{} has no effective-area table",
            path.display()
        ))
    })?;
    let table = ResponseTable::new(
        &table.energ_lo,
        &table.energ_hi,
        &table.theta_lo,
        &table.theta_hi,
        table.effarea,
    )?;
    debug!(
        "Loaded {}x{} effective-area grid",
        table.offsets.len(),
        table.energies.len()
    );
    Ok(table)
}

/// Interpolation nodes bracketing a query value.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bracket {
    lower: usize,
    upper: usize,
    /// Weight of the upper node.
    weight: f64,
}

fn bracket(nodes: &[f64], x: f64) -> Bracket {
    let last = nodes.len().saturating_sub(1);
    let at = |index| Bracket {
        lower: index,
        upper: index,
        weight: 0.0,
    };
    match (nodes.first(), nodes.last()) {
        (Some(&first), _) if !(x > first) => at(0),
        (_, Some(&final_node)) if x >= final_node => at(last),
        _ => {
            let upper = nodes.partition_point(|&node| node <= x).clamp(1, last);
            let lower = upper - 1;
            match (nodes.get(lower), nodes.get(upper)) {
                (Some(&a), Some(&b)) => Bracket {
                    lower,
                    upper,
                    weight: (x - a) / (b - a),
                },
                _ => at(0),
            }
        }
    }
}

fn midpoints(lo: &[f64], hi: &[f64]) -> Vec<f64> {
    lo.iter().zip(hi).map(|(lo, hi)| (lo + hi) / 2.0).collect()
}

fn is_ascending(nodes: &[f64]) -> bool {
    nodes.windows(2).all(|pair| matches!(pair, [a, b] if a < b))
}

/// Effective area (m²) over energy midpoints (TeV) by off-axis midpoints (deg).
#[derive(Debug, Clone)]
pub struct ResponseTable {
    energies: Vec<f64>,
    offsets: Vec<Degrees>,
    /// Indexed as `[offset, energy]`.
    area: Array2<f64>,
    energy_coverage: (f64, f64),
}

impl ResponseTable {
    pub fn new(
        energy_lo: &[f64],
        energy_hi: &[f64],
        theta_lo: &[f64],
        theta_hi: &[f64],
        area: Vec<Vec<f64>>,
    ) -> RtaResult<Self> {
        let fail = |message: &str| Err(RtaError::CalibrationLookup(message.to_owned()));
        if energy_lo.is_empty() || energy_lo.len() != energy_hi.len() {
            return fail("effective-area energy grid is empty or malformed");
        }
        if theta_lo.is_empty() || theta_lo.len() != theta_hi.len() {
            return fail("effective-area off-axis grid is empty or malformed");
        }
        let energies = midpoints(energy_lo, energy_hi);
        let offsets = midpoints(theta_lo, theta_hi);
        if !is_ascending(&energies) || !is_ascending(&offsets) {
            return fail("effective-area bins are not in ascending order");
        }
        if area.len() != offsets.len() || area.iter().any(|row| row.len() != energies.len()) {
            return fail("effective-area values do not match the bin grid");
        }
        let area = Array2::from_shape_vec(
            (offsets.len(), energies.len()),
            area.into_iter().flatten().collect(),
        )
        .map_err(|e| RtaError::CalibrationLookup(e.to_string()))?;

        let energy_coverage = match (energy_lo.first(), energy_hi.last()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => return fail("effective-area energy grid is empty"),
        };
        Ok(Self {
            energies,
            offsets,
            area,
            energy_coverage,
        })
    }

    fn node(&self, offset: usize, energy: usize) -> f64 {
        self.area.get((offset, energy)).copied().unwrap_or_default()
    }

    /// Effective area in cm² at `energy` (TeV) and off-axis angle `offset` (deg).
    pub fn area(&self, energy: f64, offset: Degrees) -> f64 {
        let e = bracket(&self.energies, energy);
        let t = bracket(&self.offsets, offset);
        let along_energy = |row| {
            (1.0 - e.weight) * self.node(row, e.lower) + e.weight * self.node(row, e.upper)
        };
        let m2 = (1.0 - t.weight) * along_energy(t.lower) + t.weight * along_energy(t.upper);
        m2 * SQUARE_METRE_TO_CM2
    }

    /// Lowest and highest energy bin edges (TeV).
    pub fn energy_range(&self) -> (f64, f64) {
        self.energy_coverage
    }

    /// Restricts `(emin, emax)` to the energies this table covers.
    pub fn clamp_energy_range(&self, (emin, emax): (f64, f64)) -> RtaResult<(f64, f64)> {
        let (lo, hi) = self.energy_coverage;
        let clamped = (emin.max(lo), emax.min(hi));
        if clamped.0 < clamped.1 {
            if clamped != (emin, emax) {
                debug!("Energy range ({emin}, {emax}) TeV clamped to {clamped:?}");
            }
            Ok(clamped)
        } else {
            Err(RtaError::CalibrationLookup(format!(
                "energy range ({emin}, {emax}) TeV lies outside the calibrated range ({lo}, {hi})"
            )))
        }
    }
}
