use rand::Rng;
use rand_distr::{Distribution, Exp, Normal, Poisson};
use rta_common::{Degrees, SkyCoord};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum DistributionError {
    #[error("Invalid Uniform Distribution: [{0}, {1})")]
    Uniform(f64, f64),
    #[error("Invalid Normal Distribution: {0}")]
    NormalDistribution(#[from] rand_distr::NormalError),
    #[error("Invalid Exponential Distribution: {0}")]
    ExpDistribution(#[from] rand_distr::ExpError),
    #[error("Invalid Poisson Distribution: {0}")]
    PoissonDistribution(#[from] rand_distr::PoissonError),
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "random-type")]
pub(crate) enum FloatRandomDistribution {
    Constant { value: f64 },
    Uniform { min: f64, max: f64 },
    Normal { mean: f64, sd: f64 },
    Exponential { lifetime: f64 },
}

impl FloatRandomDistribution {
    pub(crate) fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, DistributionError> {
        match *self {
            Self::Constant { value } => Ok(value),
            Self::Uniform { min, max } => uniform(rng, min, max),
            Self::Normal { mean, sd } => Ok(Normal::new(mean, sd)?.sample(rng)),
            Self::Exponential { lifetime } => Ok(Exp::new(1.0 / lifetime)?.sample(rng)),
        }
    }
}

/// Uniform on `[min, max)`; a degenerate interval yields `min`.
pub(crate) fn uniform<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> Result<f64, DistributionError> {
    if min < max {
        Ok(rng.random_range(min..max))
    } else if min == max {
        Ok(min)
    } else {
        Err(DistributionError::Uniform(min, max))
    }
}

/// A Poisson draw; a non-positive mean yields nothing.
pub(crate) fn poisson<R: Rng + ?Sized>(rng: &mut R, mean: f64) -> Result<u64, DistributionError> {
    if mean > 0.0 {
        Ok(Poisson::new(mean)?.sample(rng) as u64)
    } else {
        Ok(0)
    }
}

/// An energy drawn from `E^index` on `[e1, e2)` by inverting the CDF.
pub(crate) fn power_law_energy<R: Rng + ?Sized>(rng: &mut R, index: f64, (e1, e2): (f64, f64)) -> f64 {
    let u = rng.random::<f64>();
    let energy = if index == -1.0 {
        e1 * (e2 / e1).powf(u)
    } else {
        let delta = index + 1.0;
        (e1.powf(delta) + u * (e2.powf(delta) - e1.powf(delta))).powf(1.0 / delta)
    };
    energy.clamp(e1, e2)
}

/// A position uniformly distributed over the spherical cap of `radius`
/// around `center`.
pub(crate) fn uniform_in_cap<R: Rng + ?Sized>(rng: &mut R, center: SkyCoord, radius: Degrees) -> SkyCoord {
    let cos_radius = radius.to_radians().cos();
    let cos_theta = 1.0 - rng.random::<f64>() * (1.0 - cos_radius);
    let position_angle = rng.random_range(0.0..360.0);
    center.offset_by(position_angle, cos_theta.clamp(-1.0, 1.0).acos().to_degrees())
}

/// `center` smeared by a circular Gaussian point-spread function.
pub(crate) fn gaussian_smear<R: Rng + ?Sized>(
    rng: &mut R,
    center: SkyCoord,
    sigma: Degrees,
) -> Result<SkyCoord, DistributionError> {
    if sigma <= 0.0 {
        return Ok(center);
    }
    let normal = Normal::new(0.0, sigma)?;
    let (east, north) = (normal.sample(rng), normal.sample(rng));
    Ok(center.offset_by(east.atan2(north).to_degrees(), east.hypot(north)))
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct RandomDelay {
    /// Telescope slew time (s).
    #[serde(default = "RandomDelay::default_slew")]
    pub(crate) slew: FloatRandomDistribution,
    /// Latency of the gravitational-wave alert (s).
    #[serde(default = "RandomDelay::default_latency")]
    pub(crate) latency: FloatRandomDistribution,
}

impl RandomDelay {
    fn default_slew() -> FloatRandomDistribution {
        FloatRandomDistribution::Uniform { min: 0.0, max: 50.0 }
    }

    fn default_latency() -> FloatRandomDistribution {
        FloatRandomDistribution::Uniform {
            min: 0.0,
            max: 36000.0,
        }
    }

    /// Total delay between the burst and the start of the observation.
    pub(crate) fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, DistributionError> {
        Ok(self.slew.sample(rng)? + self.latency.sample(rng)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn distributions_from_json() {
        let delay: RandomDelay = serde_json::from_str(
            r#"{ "latency": { "random-type": "constant", "value": 600 } }"#,
        )
        .unwrap();
        assert_eq!(delay.slew, RandomDelay::default_slew());

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let total = delay.sample(&mut rng).unwrap();
            assert!((600.0..650.0).contains(&total));
        }
    }

    #[test]
    fn same_seed_same_draws() {
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..10)
                .map(|_| power_law_energy(&mut rng, -2.4, (0.04, 1.0)))
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(7), draw(7));
        assert_ne!(draw(7), draw(8));
    }

    #[test]
    fn power_law_energies_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for index in [-2.4, -1.0, 0.5] {
            for _ in 0..1000 {
                let energy = power_law_energy(&mut rng, index, (0.04, 1.0));
                assert!((0.04..=1.0).contains(&energy));
            }
        }
    }

    #[test]
    fn cap_positions_stay_inside() {
        let mut rng = StdRng::seed_from_u64(5);
        let center = SkyCoord::new(0.0, 0.5);
        for _ in 0..1000 {
            assert!(center.separation(&uniform_in_cap(&mut rng, center, 2.5)) <= 2.5 + 1e-9);
        }
    }

    #[test]
    fn degenerate_inputs() {
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(poisson(&mut rng, 0.0).unwrap(), 0);
        assert_eq!(uniform(&mut rng, 3.0, 3.0).unwrap(), 3.0);
        assert!(uniform(&mut rng, 3.0, 2.0).is_err());
        let center = SkyCoord::new(10.0, 10.0);
        assert_eq!(gaussian_smear(&mut rng, center, 0.0).unwrap(), center);
        let smeared = gaussian_smear(&mut rng, center, 0.05).unwrap();
        assert_approx_eq!(smeared.dec, 10.0, 0.5);
    }
}
