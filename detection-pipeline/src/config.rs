use rta_common::{ErrorCodeLocation, RtaError, RtaResult, RunConfig, Time};
use rta_photometry::{BackgroundMethod, Growth, SignificancePolicy};
use serde::Deserialize;

///
/// This struct is created from the configuration JSON file.
///
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct AnalysisConfig {
    #[serde(flatten)]
    pub(crate) run: RunConfig,
    /// Exposures (s) analysed for every trial, in ascending order.
    pub(crate) exposure: Vec<Time>,
    /// Ladder each exposure up to `tobs`, stopping at the first detection.
    #[serde(default)]
    pub(crate) cumulative: bool,
    /// Split the observation into consecutive bins of each exposure.
    #[serde(default)]
    pub(crate) lightcurve: bool,
    #[serde(default = "AnalysisConfig::default_growth")]
    pub(crate) growth: Growth,
    #[serde(default)]
    pub(crate) background: BackgroundMethod,
    #[serde(default)]
    pub(crate) significance_policy: SignificancePolicy,
    #[serde(default = "AnalysisConfig::default_sigma_threshold")]
    pub(crate) sigma_threshold: f64,
    /// On and off region radius (deg).
    #[serde(default = "AnalysisConfig::default_region_radius")]
    pub(crate) region_radius: f64,
    /// Spectral index assumed when averaging the effective area.
    #[serde(default = "AnalysisConfig::default_index")]
    pub(crate) index: f64,
    #[serde(default = "AnalysisConfig::default_tool")]
    pub(crate) tool: String,
    #[serde(default = "AnalysisConfig::default_type", rename = "type")]
    pub(crate) analysis_type: String,
    #[serde(default)]
    pub(crate) save_off_regions: bool,
    /// Points in the energy grid used to average the effective area.
    #[serde(default = "AnalysisConfig::default_nbin")]
    pub(crate) nbin: usize,
}

impl AnalysisConfig {
    fn default_growth() -> Growth {
        Growth::Linear
    }

    fn default_sigma_threshold() -> f64 {
        5.0
    }

    fn default_region_radius() -> f64 {
        0.2
    }

    fn default_index() -> f64 {
        -2.1
    }

    fn default_tool() -> String {
        "rtatool".to_owned()
    }

    fn default_type() -> String {
        "1d".to_owned()
    }

    fn default_nbin() -> usize {
        1000
    }

    pub(crate) fn validate(&self) -> RtaResult<()> {
        self.run.validate()?;
        let fail = |message: String| {
            Err(RtaError::configuration(
                message,
                ErrorCodeLocation::ValidateAnalysisConfig,
            ))
        };
        if self.exposure.is_empty() {
            return fail("at least one \"exposure\" is required".to_owned());
        }
        if let Some(exposure) = self
            .exposure
            .iter()
            .find(|&&exposure| !(exposure > 0.0 && exposure <= self.run.tobs))
        {
            return fail(format!("exposure {exposure} must lie in (0, tobs]"));
        }
        if self.cumulative && self.lightcurve {
            return fail("\"cumulative\" and \"lightcurve\" are exclusive".to_owned());
        }
        if !(self.region_radius > 0.0) {
            return fail("\"region-radius\" must be positive".to_owned());
        }
        if self.nbin < 2 {
            return fail("\"nbin\" must be at least 2".to_owned());
        }
        if let BackgroundMethod::Reflection { regions: Some(0) }
        | BackgroundMethod::Ring { regions: 0, .. } = self.background
        {
            return fail("at least one off region is required".to_owned());
        }
        Ok(())
    }

    /// Name of the aperture photometry pipeline, e.g. `rtatool1d`.
    pub(crate) fn pipe(&self) -> String {
        format!("{}{}", self.tool, self.analysis_type)
    }
}
