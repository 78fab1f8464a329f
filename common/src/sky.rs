//! Spherical geometry on the celestial sphere.
//!
//! All angles crossing the public API are in degrees; trigonometry is done in
//! radians internally. The formulae are the numerically stable forms (Vincenty
//! for separations) so that regions a few arcminutes apart still compare
//! correctly.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub type Degrees = f64;

/// An equatorial position (RA, Dec) in degrees.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyCoord {
    pub ra: Degrees,
    pub dec: Degrees,
}

impl SkyCoord {
    pub fn new(ra: Degrees, dec: Degrees) -> Self {
        Self { ra, dec }
    }

    /// Great-circle distance to `other`.
    pub fn separation(&self, other: &SkyCoord) -> Degrees {
        let (lat1, lat2) = (self.dec.to_radians(), other.dec.to_radians());
        let dlon = (other.ra - self.ra).to_radians();

        let num1 = lat2.cos() * dlon.sin();
        let num2 = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        let denominator = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * dlon.cos();

        num1.hypot(num2).atan2(denominator).to_degrees()
    }

    /// Position angle of `other` as seen from `self`, measured east of north,
    /// in `[0, 360)`.
    pub fn position_angle(&self, other: &SkyCoord) -> Degrees {
        let (lat1, lat2) = (self.dec.to_radians(), other.dec.to_radians());
        let dlon = (other.ra - self.ra).to_radians();

        let x = lat2.sin() * lat1.cos() - lat2.cos() * lat1.sin() * dlon.cos();
        let y = dlon.sin() * lat2.cos();

        y.atan2(x).to_degrees().rem_euclid(360.0)
    }

    /// The point at angular distance `separation` from `self` along
    /// `position_angle` (east of north).
    pub fn offset_by(&self, position_angle: Degrees, separation: Degrees) -> SkyCoord {
        let lat = self.dec.to_radians();
        let posang = position_angle.to_radians();
        let distance = separation.to_radians();

        let (cos_a, sin_a) = (distance.cos(), distance.sin());
        let (cos_c, sin_c) = (lat.sin(), lat.cos());
        let (cos_b_angle, sin_b_angle) = (posang.cos(), posang.sin());

        let cos_b = cos_c * cos_a + sin_c * sin_a * cos_b_angle;
        let xsin_a = sin_a * sin_b_angle * sin_c;
        let xcos_a = cos_a - cos_b * cos_c;

        // At the poles the azimuth is taken relative to the given RA.
        let azimuth = if sin_c < 1e-12 {
            std::f64::consts::FRAC_PI_2 + cos_c * (std::f64::consts::FRAC_PI_2 - posang)
        } else {
            xsin_a.atan2(xcos_a)
        };

        SkyCoord {
            ra: (self.ra + azimuth.to_degrees()).rem_euclid(360.0),
            dec: cos_b.clamp(-1.0, 1.0).asin().to_degrees(),
        }
    }
}

impl Display for SkyCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.ra, self.dec)
    }
}
