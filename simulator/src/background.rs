use crate::{
    simulation_config::BackgroundModel,
    utils::{DistributionError, poisson, power_law_energy, uniform, uniform_in_cap},
};
use rand::Rng;
use rta_common::{Degrees, Event, Gti, SkyCoord};
use std::f64::consts::PI;

/// Square degrees in the spherical cap of `radius`.
pub(crate) fn cap_area(radius: Degrees) -> f64 {
    2.0 * PI * (1.0 - radius.to_radians().cos()) * (180.0 / PI).powi(2)
}

/// Background events over the field of view of radius `roi` around
/// `pointing` during `gti`.
pub(crate) fn simulate_background<R: Rng + ?Sized>(
    rng: &mut R,
    model: &BackgroundModel,
    pointing: SkyCoord,
    roi: Degrees,
    erange: (f64, f64),
    gti: Gti,
) -> Result<Vec<Event>, DistributionError> {
    let expected = model.rate * cap_area(roi) * gti.duration();
    let count = poisson(rng, expected)?;
    (0..count)
        .map(|_| {
            let position = uniform_in_cap(rng, pointing, roi);
            Ok(Event {
                ra: position.ra,
                dec: position.dec,
                energy: power_law_energy(rng, model.index, erange),
                time: uniform(rng, gti.start, gti.stop)?,
            })
        })
        .collect()
}
