//! On/off region placement for aperture photometry.

use rta_common::{Degrees, RtaError, RtaResult, SkyCoord};
use serde::Deserialize;
use std::{f64::consts::PI, fmt::Write as _, path::Path};
use tracing::{debug, instrument};

/// Upper bound on the number of reflected regions tried when none is configured.
const MAX_REFLECTED_REGIONS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SkyRegion {
    pub center: SkyCoord,
    pub radius: Degrees,
}

impl SkyRegion {
    pub fn new(center: SkyCoord, radius: Degrees) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, position: &SkyCoord) -> bool {
        self.radius > 0.0 && self.center.separation(position) <= self.radius
    }

    /// Touching regions do not overlap.
    pub fn overlaps(&self, other: &SkyRegion) -> bool {
        self.center.separation(&other.center) < self.radius + other.radius
    }

    /// Solid angle of the spherical cap, in steradians.
    pub fn solid_angle(&self) -> f64 {
        2.0 * PI * (1.0 - self.radius.to_radians().cos())
    }
}

/// How the off-source regions are placed around the pointing.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case", tag = "method")]
pub enum BackgroundMethod {
    /// Copies of the on-region rotated about the pointing. `regions` defaults
    /// to as many as fit.
    #[strum(to_string = "reflection")]
    Reflection {
        #[serde(default)]
        regions: Option<usize>,
    },
    /// A fixed ring of regions at `distance` from the pointing.
    #[strum(to_string = "ring")]
    Ring { distance: Degrees, regions: usize },
}

impl Default for BackgroundMethod {
    fn default() -> Self {
        Self::Reflection { regions: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionSet {
    pub on: SkyRegion,
    pub off: Vec<SkyRegion>,
}

impl RegionSet {
    /// On solid angle over the summed off solid angle. Infinite with no off
    /// regions.
    pub fn alpha(&self) -> f64 {
        let off = self.off.iter().map(SkyRegion::solid_angle).sum::<f64>();
        self.on.solid_angle() / off
    }

    pub fn to_ds9(&self) -> String {
        let mut text = String::from("# Region file format: DS9\nglobal color=green width=1\nfk5\n");
        let circle = |text: &mut String, region: &SkyRegion, tag: &str| {
            let _ = writeln!(
                text,
                "circle({:.6},{:.6},{:.6}) # {tag}",
                region.center.ra, region.center.dec, region.radius
            );
        };
        circle(&mut text, &self.on, "text={ON}");
        for (n, region) in self.off.iter().enumerate() {
            circle(&mut text, region, &format!("color=red text={{OFF {}}}", n + 1));
        }
        text
    }

    pub fn write_ds9(&self, path: &Path) -> RtaResult<()> {
        std::fs::write(path, self.to_ds9())?;
        Ok(())
    }
}

fn geometry(message: impl Into<String>) -> RtaError {
    RtaError::Geometry(message.into())
}

fn is_disjoint(on: &SkyRegion, off: &[SkyRegion]) -> bool {
    off.iter().enumerate().all(|(i, region)| {
        !region.overlaps(on) && off.iter().skip(i + 1).all(|other| !region.overlaps(other))
    })
}

/// `n` copies of `on` rotated about `pointing` in steps of `360 / (n + 1)`,
/// starting one step after the target.
fn reflected(on: &SkyRegion, pointing: &SkyCoord, n: usize) -> Vec<SkyRegion> {
    let distance = pointing.separation(&on.center);
    let start = pointing.position_angle(&on.center);
    let step = 360.0 / (n + 1) as f64;
    (1..=n)
        .map(|k| SkyRegion::new(pointing.offset_by(start + step * k as f64, distance), on.radius))
        .collect()
}

/// The largest number of reflected regions whose centres, spaced evenly
/// around the pointing, stay at least two radii apart.
fn max_reflected(on: &SkyRegion, pointing: &SkyCoord) -> usize {
    let d = pointing.separation(&on.center).to_radians();
    let two_r = (2.0 * on.radius).to_radians();
    let cos_step = ((two_r.cos() - d.cos().powi(2)) / d.sin().powi(2)).clamp(-1.0, 1.0);
    let min_step = cos_step.acos().to_degrees();
    if min_step <= 0.0 {
        return MAX_REFLECTED_REGIONS;
    }
    ((360.0 / min_step).floor() as usize)
        .saturating_sub(1)
        .clamp(1, MAX_REFLECTED_REGIONS)
}

fn reflection(on: &SkyRegion, pointing: &SkyCoord, regions: Option<usize>) -> RtaResult<Vec<SkyRegion>> {
    match regions {
        Some(0) => Err(geometry("at least one reflected region is required")),
        Some(n) => {
            let off = reflected(on, pointing, n);
            if is_disjoint(on, &off) {
                Ok(off)
            } else {
                Err(geometry(format!(
                    "{n} reflected regions of radius {} do not fit around the pointing",
                    on.radius
                )))
            }
        }
        None => (1..=max_reflected(on, pointing))
            .rev()
            .map(|n| reflected(on, pointing, n))
            .find(|off| is_disjoint(on, off))
            .ok_or_else(|| geometry("no reflected region fits around the pointing")),
    }
}

fn ring(on: &SkyRegion, pointing: &SkyCoord, distance: Degrees, regions: usize) -> RtaResult<Vec<SkyRegion>> {
    if regions == 0 || !(distance > 0.0) {
        return Err(geometry("a ring needs a positive distance and at least one region"));
    }
    let step = 360.0 / regions as f64;
    let off = (0..regions)
        .map(|k| SkyRegion::new(pointing.offset_by(step * k as f64, distance), on.radius))
        .filter(|region| !region.overlaps(on))
        .collect::<Vec<_>>();
    if off.is_empty() {
        Err(geometry("every ring region overlaps the on-region"))
    } else if !is_disjoint(on, &off) {
        Err(geometry(format!(
            "{regions} ring regions of radius {} overlap each other at distance {distance}",
            on.radius
        )))
    } else {
        Ok(off)
    }
}

/// The on-region around `target` and the off-regions for `method`.
///
/// The radius must be below half the pointing-target separation so that no
/// region covers the pointing centre.
#[instrument(skip_all, fields(on = %target, pointing = %pointing, radius = radius, method = %method))]
pub fn find_off_regions(
    method: &BackgroundMethod,
    target: SkyCoord,
    pointing: SkyCoord,
    radius: Degrees,
) -> RtaResult<RegionSet> {
    if !(radius > 0.0) {
        return Err(geometry(format!("region radius {radius} must be positive")));
    }
    let separation = pointing.separation(&target);
    if radius >= separation / 2.0 {
        return Err(geometry(format!(
            "region radius {radius} is not below half the pointing-target separation {separation}"
        )));
    }
    let on = SkyRegion::new(target, radius);
    let off = match *method {
        BackgroundMethod::Reflection { regions } => reflection(&on, &pointing, regions)?,
        BackgroundMethod::Ring { distance, regions } => ring(&on, &pointing, distance, regions)?,
    };
    debug!("Placed {} off regions", off.len());
    Ok(RegionSet { on, off })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const TARGET: SkyCoord = SkyCoord {
        ra: 33.057,
        dec: -51.841,
    };
    const POINTING: SkyCoord = SkyCoord {
        ra: 33.057,
        dec: -52.341,
    };

    fn assert_disjoint(set: &RegionSet) {
        assert!(is_disjoint(&set.on, &set.off));
        for region in &set.off {
            assert_approx_eq!(POINTING.separation(&region.center), 0.5, 1e-9);
        }
    }

    #[test]
    fn single_reflection_mirrors_target_through_pointing() {
        let method = BackgroundMethod::Reflection { regions: Some(1) };
        let set = find_off_regions(&method, TARGET, POINTING, 0.2).unwrap();
        let off = set.off.first().unwrap();
        assert_eq!(set.off.len(), 1);
        assert_approx_eq!(off.center.ra, 33.057, 1e-9);
        assert_approx_eq!(off.center.dec, -52.841, 1e-9);
        assert_approx_eq!(set.alpha(), 1.0, 1e-12);
    }

    #[test]
    fn default_reflection_packs_as_many_as_fit() {
        let method = BackgroundMethod::default();
        for radius in [0.05, 0.1, 0.2, 0.24] {
            let set = find_off_regions(&method, TARGET, POINTING, radius).unwrap();
            assert_disjoint(&set);
            let one_more = reflected(&set.on, &POINTING, set.off.len() + 1);
            assert!(!is_disjoint(&set.on, &one_more));
            assert_approx_eq!(set.alpha(), 1.0 / set.off.len() as f64, 1e-9);
        }
    }

    #[test]
    fn radius_at_half_separation_is_rejected() {
        let method = BackgroundMethod::default();
        for radius in [0.25, 0.3, 1.0] {
            assert!(matches!(
                find_off_regions(&method, TARGET, POINTING, radius),
                Err(RtaError::Geometry(_))
            ));
        }
        assert!(find_off_regions(&method, TARGET, TARGET, 0.1).is_err());
        assert!(find_off_regions(&method, TARGET, POINTING, 0.0).is_err());
    }

    #[test]
    fn too_many_requested_regions_is_rejected() {
        let method = BackgroundMethod::Reflection { regions: Some(50) };
        assert!(find_off_regions(&method, TARGET, POINTING, 0.2).is_err());
        let method = BackgroundMethod::Reflection { regions: Some(0) };
        assert!(find_off_regions(&method, TARGET, POINTING, 0.2).is_err());
    }

    #[test]
    fn ring_drops_regions_on_the_target() {
        // The target lies at position angle 0 from the pointing.
        let method = BackgroundMethod::Ring {
            distance: 0.5,
            regions: 4,
        };
        let set = find_off_regions(&method, TARGET, POINTING, 0.2).unwrap();
        assert_eq!(set.off.len(), 3);
        assert_disjoint(&set);

        let crowded = BackgroundMethod::Ring {
            distance: 0.5,
            regions: 20,
        };
        assert!(find_off_regions(&crowded, TARGET, POINTING, 0.2).is_err());
    }

    #[test]
    fn ds9_lists_every_region() {
        let set = find_off_regions(&BackgroundMethod::default(), TARGET, POINTING, 0.2).unwrap();
        let text = set.to_ds9();
        assert_eq!(text.matches("circle(").count(), set.off.len() + 1);
        assert!(text.contains("text={OFF 1}"));
    }

    #[test]
    fn method_from_json() {
        let ring: BackgroundMethod =
            serde_json::from_str(r#"{ "method": "ring", "distance": 1.0, "regions": 6 }"#).unwrap();
        assert_eq!(ring, BackgroundMethod::Ring { distance: 1.0, regions: 6 });
        let reflection: BackgroundMethod =
            serde_json::from_str(r#"{ "method": "reflection" }"#).unwrap();
        assert_eq!(reflection, BackgroundMethod::default());
        assert_eq!(reflection.to_string(), "reflection");
    }
}
