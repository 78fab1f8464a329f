use crate::utils::RandomDelay;
use rta_common::{
    Degrees, ErrorCodeLocation, RtaError, RtaResult, RunConfig, Seed, SkyCoord,
    pointing::{Offset, offset_pointing, wobble_pointing},
};
use serde::Deserialize;

///
/// This struct is created from the configuration JSON file.
///
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct SimulationConfig {
    #[serde(flatten)]
    pub(crate) run: RunConfig,
    pub(crate) background: BackgroundModel,
    #[serde(default)]
    pub(crate) source: SourceModel,
    /// Replaces `delay` with a random slew time plus alert latency per trial.
    #[serde(default)]
    pub(crate) random_delay: Option<RandomDelay>,
}

/// Isotropic residual cosmic-ray background.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct BackgroundModel {
    /// Events per second per square degree over the configured energy range.
    pub(crate) rate: f64,
    /// Power-law index of the background energy spectrum.
    pub(crate) index: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct SourceModel {
    /// Width of the Gaussian point-spread function.
    #[serde(default = "SourceModel::default_psf")]
    pub(crate) psf: Degrees,
    /// Points in the energy grid used to predict counts.
    #[serde(default = "SourceModel::default_nbin")]
    pub(crate) nbin: usize,
    /// Attempts per photon when thinning energies by the effective area.
    #[serde(default = "SourceModel::default_max_energy_draws")]
    pub(crate) max_energy_draws: usize,
}

impl SourceModel {
    fn default_psf() -> Degrees {
        0.05
    }

    fn default_nbin() -> usize {
        1000
    }

    fn default_max_energy_draws() -> usize {
        1000
    }
}

impl Default for SourceModel {
    fn default() -> Self {
        Self {
            psf: Self::default_psf(),
            nbin: Self::default_nbin(),
            max_energy_draws: Self::default_max_energy_draws(),
        }
    }
}

impl SimulationConfig {
    pub(crate) fn validate(&self) -> RtaResult<()> {
        self.run.validate()?;
        let fail = |message: &str| {
            Err(RtaError::configuration(
                message,
                ErrorCodeLocation::ValidateSimulationConfig,
            ))
        };
        if !(self.background.rate >= 0.0) {
            return fail("background rate must not be negative");
        }
        if !(self.source.psf >= 0.0) {
            return fail("source psf must not be negative");
        }
        if self.source.nbin < 2 || self.source.max_energy_draws == 0 {
            return fail("source nbin must be at least 2 and max-energy-draws at least 1");
        }
        if self.random_delay.is_some() && self.run.onset != 0.0 {
            return fail("\"random-delay\" cannot be combined with a nonzero \"onset\"");
        }
        Ok(())
    }

    /// Pointing of an empty-field observation, offset from the origin.
    pub(crate) fn background_pointing(&self, seed: Seed) -> RtaResult<SkyCoord> {
        let origin = SkyCoord::default();
        match (&self.run.wobble, self.run.offset) {
            (Some(wobble), _) => Ok(wobble_pointing(origin, seed, wobble)),
            (None, Offset::Degrees(offset)) => Ok(offset_pointing(origin, offset)),
            (None, Offset::Alert(_)) => Err(RtaError::configuration(
                "background fields need a numeric offset",
                ErrorCodeLocation::SimulateBackground,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rta_common::ErrorScope;

    fn json_input(extra: &str) -> String {
        format!(
            r#"
            {{
                "data": "{}",
                "catalog": "/catalog",
                "caldb-root": "/caldb",
                "runid": "run0406_ID000126",
                "caldb": "prod5-v0.1",
                "irf": "South_z40_0.5h",
                "trials": 5,
                "offset": 0.5,
                "delay": 50,
                "tobs": 600,
                "emin": 0.04,
                "emax": 1.0,
                "roi": 2.5,
                "background": {{ "rate": 0.02, "index": -2.7 }}
                {extra}
            }}
            "#,
            std::env::temp_dir().display()
        )
    }

    #[test]
    fn flattened_run_keys() {
        let config: SimulationConfig = serde_json::from_str(&json_input("")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.run.delay, 50.0);
        assert_eq!(config.source.nbin, 1000);
        assert!(config.random_delay.is_none());
        assert_eq!(
            config.background_pointing(1).unwrap(),
            SkyCoord::new(0.0, 0.5)
        );
    }

    #[test]
    fn random_delay_with_onset_is_rejected() {
        let config: SimulationConfig = serde_json::from_str(
            &json_input(r#", "random-delay": {}, "onset": 30"#).replace(r#""delay": 50,"#, ""),
        )
        .unwrap();
        assert_eq!(config.validate().unwrap_err().scope(), ErrorScope::Run);
    }

    #[test]
    fn gw_background_is_rejected() {
        let config: SimulationConfig =
            serde_json::from_str(&json_input("").replace(r#""offset": 0.5"#, r#""offset": "gw""#))
                .unwrap();
        assert!(config.background_pointing(1).is_err());
    }
}
