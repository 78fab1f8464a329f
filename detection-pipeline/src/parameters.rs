use std::str::FromStr;

use anyhow::{Error, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use rta_photometry::SignificancePolicy;

/// An energy range in TeV, given as `emin,emax`.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub(crate) struct EnergyRangeWrapper(pub(crate) (f64, f64));

impl FromStr for EnergyRangeWrapper {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split(',').collect::<Vec<_>>().as_slice() {
            [emin, emax] => {
                let range = (f64::from_str(emin.trim())?, f64::from_str(emax.trim())?);
                if range.0 > 0.0 && range.0 < range.1 {
                    Ok(EnergyRangeWrapper(range))
                } else {
                    Err(anyhow!("Energy range must satisfy 0 < emin < emax, got '{s}'"))
                }
            }
            _ => Err(anyhow!(
                "Incorrect number of parameters in energy range, expected pattern '*,*', got '{s}'"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum PolicyArg {
    Strict,
    Relaxed,
}

impl From<PolicyArg> for SignificancePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Strict => SignificancePolicy::Strict,
            PolicyArg::Relaxed => SignificancePolicy::Relaxed,
        }
    }
}

#[derive(Default, Debug, Clone, Parser)]
pub(crate) struct ApertureParameters {
    /// Overrides the configured energy range (TeV), e.g. `0.04,1.0`
    #[clap(long)]
    pub(crate) energy_range: Option<EnergyRangeWrapper>,

    /// Overrides the configured treatment of empty off-source samples
    #[clap(long, value_enum)]
    pub(crate) policy: Option<PolicyArg>,

    /// Writes the on/off regions of every trial as DS9 region files
    #[clap(long)]
    pub(crate) save_off_regions: bool,
}

#[derive(Default, Debug, Clone, Parser)]
pub(crate) struct BlindSearchParameters {
    /// Overrides the configured energy range (TeV) used for fluxes
    #[clap(long)]
    pub(crate) energy_range: Option<EnergyRangeWrapper>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Mode {
    #[clap(
        about = "Counts photons in on/off regions around the target and converts the excess into a flux."
    )]
    Aperture(ApertureParameters),
    #[clap(
        about = "Collects the candidates of an external blind-search fit and integrates their spectra."
    )]
    BlindSearch(BlindSearchParameters),
}
