pub mod config;
pub mod error;
pub mod event_list;
pub mod log_row;
pub mod pointing;
pub mod sky;
pub mod template;
pub mod tracer;

pub use config::{RunConfig, Seed};
pub use error::{ErrorCodeLocation, ErrorScope, RtaError, RtaResult};
pub use event_list::{Event, EventList, Gti};
pub use sky::{Degrees, SkyCoord};
pub use template::GrbTemplate;

/// Seconds since the start of an observation.
pub type Time = f64;
