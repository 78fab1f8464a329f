use crate::{
    simulation_config::SourceModel,
    utils::{DistributionError, gaussian_smear, poisson, power_law_energy, uniform},
};
use rand::Rng;
use rta_common::{Event, SkyCoord, template::TimeSlice};
use rta_photometry::{
    ResponseTable,
    flux::{log_space, predicted_counts},
};
use tracing::trace;

/// Photons from a point source seen through one effective-area table.
pub(crate) struct SourceSimulator<'a> {
    irf: &'a ResponseTable,
    model: &'a SourceModel,
    target: SkyCoord,
    offset: f64,
    erange: (f64, f64),
    scale_flux: f64,
    peak_area: f64,
}

impl<'a> SourceSimulator<'a> {
    pub(crate) fn new(
        irf: &'a ResponseTable,
        model: &'a SourceModel,
        target: SkyCoord,
        pointing: SkyCoord,
        erange: (f64, f64),
        scale_flux: f64,
    ) -> Self {
        let offset = pointing.separation(&target);
        let peak_area = log_space(erange.0, erange.1, model.nbin)
            .into_iter()
            .map(|energy| irf.area(energy, offset))
            .fold(0.0, f64::max);
        Self {
            irf,
            model,
            target,
            offset,
            erange,
            scale_flux,
            peak_area,
        }
    }

    pub(crate) fn expected_counts(&self, slice: &TimeSlice<'_>) -> f64 {
        predicted_counts(
            slice.gti.duration(),
            self.irf,
            slice.spectrum.prefactor * self.scale_flux,
            self.offset,
            self.erange,
            self.model.nbin,
        )
    }

    /// An energy from the slice spectrum, accepted in proportion to the
    /// effective area at that energy.
    fn detected_energy<R: Rng + ?Sized>(&self, rng: &mut R, index: f64) -> f64 {
        let mut energy = power_law_energy(rng, index, self.erange);
        for _ in 1..self.model.max_energy_draws {
            if rng.random::<f64>() * self.peak_area <= self.irf.area(energy, self.offset) {
                break;
            }
            energy = power_law_energy(rng, index, self.erange);
        }
        energy
    }

    pub(crate) fn simulate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        slice: &TimeSlice<'_>,
    ) -> Result<Vec<Event>, DistributionError> {
        let expected = self.expected_counts(slice);
        let count = poisson(rng, expected)?;
        trace!(
            "Slice [{}, {}): expected {expected:.2}, drew {count}",
            slice.gti.start, slice.gti.stop
        );
        (0..count)
            .map(|_| {
                let position = gaussian_smear(rng, self.target, self.model.psf)?;
                Ok(Event {
                    ra: position.ra,
                    dec: position.dec,
                    energy: self.detected_energy(rng, slice.spectrum.index),
                    time: uniform(rng, slice.gti.start, slice.gti.stop)?,
                })
            })
            .collect()
    }
}
