//! Aperture photometry: effective areas, on/off regions, counting,
//! significance, flux conversion and exposure ladders.

pub mod counting;
pub mod exposure;
pub mod flux;
pub mod irf;
pub mod regions;
pub mod significance;

pub use counting::{EventSelection, count, count_regions};
pub use exposure::{AdaptiveExposure, Growth, LadderState};
pub use flux::EnergyUnit;
pub use irf::ResponseTable;
pub use regions::{BackgroundMethod, RegionSet, SkyRegion, find_off_regions};
pub use significance::{CountingResult, Diagnostic, SignificanceEngine, SignificancePolicy};
