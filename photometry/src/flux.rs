//! Power-law flux integrals and count predictions.
//!
//! Spectra are `dN/dE = k0 * (E / e0)^gamma`. Prefactors are in ph/cm²/s/MeV
//! with `e0` in MeV unless a function says otherwise.

use crate::irf::ResponseTable;
use itertools::Itertools;
use rta_common::{Degrees, Time};
use serde::Deserialize;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString)]
pub enum EnergyUnit {
    #[serde(rename = "eV")]
    #[strum(serialize = "eV")]
    Ev,
    #[serde(rename = "keV")]
    #[strum(serialize = "keV")]
    Kev,
    #[serde(rename = "MeV")]
    #[strum(serialize = "MeV")]
    Mev,
    #[serde(rename = "GeV")]
    #[strum(serialize = "GeV")]
    Gev,
    #[serde(rename = "TeV")]
    #[strum(serialize = "TeV")]
    Tev,
}

impl EnergyUnit {
    pub fn to_mev(self) -> f64 {
        match self {
            Self::Ev => 1e-6,
            Self::Kev => 1e-3,
            Self::Mev => 1.0,
            Self::Gev => 1e3,
            Self::Tev => 1e6,
        }
    }

    pub fn to_erg(self) -> f64 {
        match self {
            Self::Ev => 1.60218e-12,
            Self::Kev => 1.60218e-9,
            Self::Mev => 1.60218e-6,
            Self::Gev => 1.60218e-3,
            Self::Tev => 1.60218,
        }
    }
}

/// `∫ k0 (E/e0)^gamma dE` over `erange`, given in `unit` and converted to MeV.
pub fn integrated_photon_flux(gamma: f64, k0: f64, e0: f64, erange: (f64, f64), unit: EnergyUnit) -> f64 {
    let conv = unit.to_mev();
    let (e1, e2) = (erange.0 * conv, erange.1 * conv);
    if gamma == -1.0 {
        k0 * e0 * (e2 / e1).ln()
    } else {
        let delta = gamma + 1.0;
        k0 / (e0.powf(gamma) * delta) * (e2.powf(delta) - e1.powf(delta))
    }
}

/// `∫ E k0 (E/e0)^gamma dE` over `erange`, with the energies, `k0` and `e0`
/// all scaled to erg.
pub fn integrated_energy_flux(gamma: f64, k0: f64, e0: f64, erange: (f64, f64), unit: EnergyUnit) -> f64 {
    let conv = unit.to_erg();
    let (e1, e2) = (erange.0 * conv, erange.1 * conv);
    let (k0, e0) = (k0 * conv, e0 * conv);
    if gamma == -2.0 {
        k0 * e0 * e0 * (e2 / e1).ln()
    } else {
        let delta = gamma + 2.0;
        k0 / (e0.powf(gamma) * delta) * (e2.powf(delta) - e1.powf(delta))
    }
}

/// Inverse of [`integrated_photon_flux`] for `k0`.
pub fn prefactor_from_flux(photon_flux: f64, erange: (f64, f64), gamma: f64, e0: f64, unit: EnergyUnit) -> f64 {
    let conv = unit.to_mev();
    let (e1, e2) = (erange.0 * conv, erange.1 * conv);
    if gamma == -1.0 {
        photon_flux / (e0 * (e2 / e1).ln())
    } else {
        let delta = gamma + 1.0;
        photon_flux / (e2.powf(delta) - e1.powf(delta)) * e0.powf(gamma) * delta
    }
}

/// ph/cm²/s from an excess, an effective area (cm²) and a livetime (s).
pub fn excess_to_flux(excess: f64, effective_area: f64, livetime: Time) -> f64 {
    excess / effective_area / livetime
}

/// `n` points from `lo` to `hi` inclusive, evenly spaced in log10.
pub fn log_space(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let (log_lo, log_hi) = (lo.log10(), hi.log10());
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => (0..n)
            .map(|i| 10f64.powf(log_lo + (log_hi - log_lo) * i as f64 / (n - 1) as f64))
            .collect(),
    }
}

pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .tuple_windows()
        .map(|((x1, y1), (x2, y2))| (x2 - x1) * (y1 + y2) / 2.0)
        .sum()
}

/// Effective area (cm²) at `offset` averaged over `erange` (TeV), weighted by
/// a power law of `index`.
pub fn integrated_effective_area(
    irf: &ResponseTable,
    offset: Degrees,
    erange: (f64, f64),
    index: f64,
    nbin: usize,
) -> f64 {
    let energies = log_space(erange.0, erange.1, nbin.max(2));
    let weights = energies.iter().map(|e| e.powf(index)).collect::<Vec<_>>();
    let weighted = energies
        .iter()
        .zip(&weights)
        .map(|(&e, w)| irf.area(e, offset) * w)
        .collect::<Vec<_>>();
    trapezoid(&energies, &weighted) / trapezoid(&energies, &weights)
}

/// Expected photons in `texp` seconds from a flat spectrum of `k0`
/// ph/cm²/s/MeV, over `erange` (TeV) at `offset`.
pub fn predicted_counts(
    texp: Time,
    irf: &ResponseTable,
    k0: f64,
    offset: Degrees,
    erange: (f64, f64),
    nbin: usize,
) -> f64 {
    const TEV_TO_MEV: f64 = 1e6;
    log_space(erange.0, erange.1, nbin)
        .into_iter()
        .tuple_windows()
        .map(|(e1, e2)| {
            let mean_area = (irf.area(e1, offset) + irf.area(e2, offset)) / 2.0;
            k0 * texp * mean_area * (e2 - e1) * TEV_TO_MEV
        })
        .sum()
}
