use std::path::PathBuf;
use thiserror::Error;

pub type RtaResult<T> = Result<T, RtaError>;

/// Where in the pipeline a fatal configuration problem was detected.
#[derive(Debug, Clone, Copy, strum::Display)]
pub enum ErrorCodeLocation {
    #[strum(to_string = "RunConfig::validate")]
    ValidateRunConfig,
    #[strum(to_string = "resolve_pointing")]
    ResolvePointing,
    #[strum(to_string = "list_run_ids")]
    ListRunIds,
    #[strum(to_string = "simulate_background")]
    SimulateBackground,
    #[strum(to_string = "simulate_grb")]
    SimulateGrb,
    #[strum(to_string = "SimulationConfig::validate")]
    ValidateSimulationConfig,
    #[strum(to_string = "AnalysisConfig::validate")]
    ValidateAnalysisConfig,
}

/// How far an error propagates before the batch recovers from it.
///
/// Orchestrators match on this at their loop boundaries: a `Run` error aborts
/// everything, the others skip the corresponding unit of work and continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorScope {
    #[strum(to_string = "run")]
    Run,
    #[strum(to_string = "combination")]
    Combination,
    #[strum(to_string = "trial")]
    Trial,
    #[strum(to_string = "step")]
    Step,
}

#[derive(Debug, Error)]
pub enum RtaError {
    #[error("Bad configuration: {message} at {location}")]
    Configuration {
        message: String,
        location: ErrorCodeLocation,
    },
    #[error("Missing calibration: {0}")]
    CalibrationLookup(String),
    #[error("Invalid template {path}: {message}")]
    Template { path: PathBuf, message: String },
    #[error("Region geometry: {0}")]
    Geometry(String),
    #[error("Missing input file: {0}")]
    MissingInput(PathBuf),
    #[error("Exposure ladder: {0}")]
    Exposure(String),
    #[error("IO Error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Json Error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Glob Pattern Error: {0}")]
    GlobPattern(#[from] glob::PatternError),
    #[error("Glob Error: {0}")]
    Glob(#[from] glob::GlobError),
}

impl RtaError {
    pub fn configuration(message: impl Into<String>, location: ErrorCodeLocation) -> Self {
        Self::Configuration {
            message: message.into(),
            location,
        }
    }

    pub fn scope(&self) -> ErrorScope {
        match self {
            Self::Configuration { .. } | Self::GlobPattern(_) | Self::Glob(_) => ErrorScope::Run,
            Self::CalibrationLookup(_) | Self::Template { .. } => ErrorScope::Combination,
            Self::MissingInput(_) | Self::IO(_) | Self::Json { .. } => ErrorScope::Trial,
            Self::Geometry(_) | Self::Exposure(_) => ErrorScope::Step,
        }
    }
}
