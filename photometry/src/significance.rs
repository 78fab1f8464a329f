//! Background-subtracted excess and Li & Ma (1983, eq. 17) significance.
//!
//! Degenerate inputs never fail: they produce a zero or NaN significance with
//! a [`Diagnostic`] attached, so every counting step still yields a row.

use serde::Deserialize;
use std::f64::consts::SQRT_2;
use strum::{Display, EnumString};

/// Counts below this in either region fall outside the regime where the
/// Li & Ma approximation holds.
const LI_MA_MINIMUM_COUNTS: u64 = 10;

/// Treatment of an empty off-source sample.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SignificancePolicy {
    /// The significance is undefined (NaN).
    #[default]
    Strict,
    /// The off counts are floored to one.
    Relaxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Diagnostic {
    #[strum(to_string = "no counts")]
    NoCounts,
    #[strum(to_string = "no on-source counts")]
    NoOnCounts,
    #[strum(to_string = "no off-source counts")]
    NoOffCounts,
    #[strum(to_string = "off-source counts floored to one")]
    OffCountsFloored,
    #[strum(to_string = "invalid alpha")]
    InvalidAlpha,
    #[strum(to_string = "not compliant with Li & Ma requirements")]
    LowCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountingResult {
    pub on: u64,
    /// Summed over every off region.
    pub off: u64,
    pub alpha: f64,
    pub excess: f64,
    pub significance: f64,
    pub diagnostic: Option<Diagnostic>,
}

/// Li & Ma significance, signed by the excess. `off` and `alpha` must be
/// positive.
pub fn li_ma(on: f64, off: f64, alpha: f64) -> f64 {
    let total = on + off;
    let on_term = if on > 0.0 {
        on * ((1.0 + alpha) / alpha * (on / total)).ln()
    } else {
        0.0
    };
    let off_term = off * ((1.0 + alpha) * (off / total)).ln();
    let significance = SQRT_2 * (on_term + off_term).max(0.0).sqrt();
    if on - alpha * off < 0.0 {
        -significance
    } else {
        significance
    }
}

#[derive(Default, Debug, Clone, Copy)]
pub struct SignificanceEngine {
    pub policy: SignificancePolicy,
}

impl SignificanceEngine {
    pub fn new(policy: SignificancePolicy) -> Self {
        Self { policy }
    }

    pub fn evaluate(&self, on: u64, off_per_region: &[u64], alpha: f64) -> CountingResult {
        let off = off_per_region.iter().sum::<u64>();
        let excess = on as f64 - alpha * off as f64;
        let (significance, diagnostic) = self.significance(on, off, alpha);
        CountingResult {
            on,
            off,
            alpha,
            excess,
            significance,
            diagnostic,
        }
    }

    fn significance(&self, on: u64, off: u64, alpha: f64) -> (f64, Option<Diagnostic>) {
        if on == 0 {
            let note = if off == 0 {
                Diagnostic::NoCounts
            } else {
                Diagnostic::NoOnCounts
            };
            return (0.0, Some(note));
        }
        if !(alpha.is_finite() && alpha > 0.0) {
            return (f64::NAN, Some(Diagnostic::InvalidAlpha));
        }
        if off == 0 {
            return match self.policy {
                SignificancePolicy::Strict => (f64::NAN, Some(Diagnostic::NoOffCounts)),
                SignificancePolicy::Relaxed => {
                    (li_ma(on as f64, 1.0, alpha), Some(Diagnostic::OffCountsFloored))
                }
            };
        }
        let note = (on < LI_MA_MINIMUM_COUNTS || off < LI_MA_MINIMUM_COUNTS)
            .then_some(Diagnostic::LowCounts);
        (li_ma(on as f64, off as f64, alpha), note)
    }
}
