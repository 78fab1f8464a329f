//! Exposure checkpoints and the adaptive stopping rule.

use rta_common::{RtaError, RtaResult, Time};
use serde::Deserialize;
use strum::{Display, EnumString};
use tracing::debug;

/// How successive cumulative exposures grow from the first one.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Growth {
    #[default]
    Double,
    /// `start^(i+2)` for the i-th added checkpoint.
    Power,
    Times10,
    /// `start * (i+2)` for the i-th added checkpoint.
    Linear,
}

impl Growth {
    fn next(self, start: Time, last: Time, added: usize) -> Time {
        match self {
            Growth::Double => last * 2.0,
            Growth::Power => start.powi((added + 2) as i32),
            Growth::Times10 => last * 10.0,
            Growth::Linear => start * (added + 2) as f64,
        }
    }
}

/// Cumulative exposures from `start` up to `stop`, the last one clamped or
/// appended so that the ladder ends exactly at `stop`.
pub fn generate(start: Time, stop: Time, growth: Growth) -> RtaResult<Vec<Time>> {
    if !(start > 0.0 && start.is_finite() && stop.is_finite()) {
        return Err(RtaError::Exposure(format!(
            "cannot grow exposures from {start} to {stop}"
        )));
    }
    if growth == Growth::Power && start <= 1.0 {
        return Err(RtaError::Exposure(format!(
            "power growth needs a start above 1, got {start}"
        )));
    }
    let mut ladder = vec![start];
    let mut last = start;
    while last < stop {
        last = growth.next(start, last, ladder.len() - 1);
        ladder.push(last);
    }
    match ladder.last_mut() {
        Some(last) if *last > stop => *last = stop,
        _ => {}
    }
    Ok(ladder)
}

/// Consecutive bins `[t, t + exposure)` from `start`, as many as fit before
/// `stop`.
pub fn lightcurve_bins(start: Time, stop: Time, exposure: Time) -> RtaResult<Vec<(Time, Time)>> {
    if !(exposure > 0.0 && exposure.is_finite()) {
        return Err(RtaError::Exposure(format!(
            "light-curve bins need a positive exposure, got {exposure}"
        )));
    }
    let mut bins = Vec::new();
    let mut t = start;
    while t + exposure <= stop {
        bins.push((t, t + exposure));
        t += exposure;
    }
    Ok(bins)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LadderState {
    #[strum(to_string = "integrating")]
    Integrating,
    #[strum(to_string = "detected")]
    Detected,
    #[strum(to_string = "exhausted")]
    Exhausted,
}

/// Walks a ladder of checkpoints until a detection or the final checkpoint.
#[derive(Debug, Clone)]
pub struct AdaptiveExposure {
    checkpoints: Vec<Time>,
    position: usize,
    threshold: f64,
    state: LadderState,
}

impl AdaptiveExposure {
    pub fn new(checkpoints: Vec<Time>, threshold: f64) -> Self {
        let state = if checkpoints.is_empty() {
            LadderState::Exhausted
        } else {
            LadderState::Integrating
        };
        Self {
            checkpoints,
            position: 0,
            threshold,
            state,
        }
    }

    pub fn state(&self) -> LadderState {
        self.state
    }

    /// The exposure to evaluate next, while still integrating.
    pub fn current(&self) -> Option<Time> {
        match self.state {
            LadderState::Integrating => self.checkpoints.get(self.position).copied(),
            _ => None,
        }
    }

    /// Records the significance at the current checkpoint. A NaN
    /// significance is not a detection.
    pub fn record(&mut self, significance: f64) -> LadderState {
        if self.state != LadderState::Integrating {
            return self.state;
        }
        self.state = if significance >= self.threshold {
            LadderState::Detected
        } else if self.position + 1 >= self.checkpoints.len() {
            LadderState::Exhausted
        } else {
            self.position += 1;
            LadderState::Integrating
        };
        if self.state != LadderState::Integrating {
            debug!(
                "Ladder {} at {:?} s with significance {significance}",
                self.state,
                self.checkpoints.get(self.position)
            );
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_ladder() {
        assert_eq!(generate(1.0, 10.0, Growth::Double).unwrap(), vec![1.0, 2.0, 4.0, 8.0, 10.0]);
    }

    #[test]
    fn times10_ladder() {
        assert_eq!(generate(2.0, 100.0, Growth::Times10).unwrap(), vec![2.0, 20.0, 100.0]);
    }

    #[test]
    fn power_ladder_uses_the_first_value() {
        assert_eq!(generate(3.0, 100.0, Growth::Power).unwrap(), vec![3.0, 9.0, 27.0, 81.0, 100.0]);
    }

    #[test]
    fn linear_ladder() {
        assert_eq!(
            generate(100.0, 450.0, Growth::Linear).unwrap(),
            vec![100.0, 200.0, 300.0, 400.0, 450.0]
        );
        assert_eq!(generate(100.0, 300.0, Growth::Linear).unwrap(), vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn ladders_that_cannot_grow_are_rejected() {
        assert!(generate(0.0, 10.0, Growth::Double).is_err());
        assert!(generate(-1.0, 10.0, Growth::Linear).is_err());
        assert!(generate(1.0, 10.0, Growth::Power).is_err());
        assert!(generate(1.0, f64::INFINITY, Growth::Double).is_err());
    }

    #[test]
    fn growth_names() {
        assert_eq!("times10".parse::<Growth>().unwrap(), Growth::Times10);
        let growth: Growth = serde_json::from_str(r#""linear""#).unwrap();
        assert_eq!(growth, Growth::Linear);
    }

    #[test]
    fn lightcurve_keeps_full_bins() {
        assert_eq!(
            lightcurve_bins(50.0, 300.0, 100.0).unwrap(),
            vec![(50.0, 150.0), (150.0, 250.0)]
        );
        assert!(lightcurve_bins(0.0, 10.0, 0.0).is_err());
    }

    #[test]
    fn adaptive_ladder_stops_on_detection() {
        let mut ladder = AdaptiveExposure::new(vec![10.0, 20.0, 40.0], 5.0);
        assert_eq!(ladder.current(), Some(10.0));
        assert_eq!(ladder.record(2.0), LadderState::Integrating);
        assert_eq!(ladder.current(), Some(20.0));
        assert_eq!(ladder.record(5.0), LadderState::Detected);
        assert_eq!(ladder.current(), None);
        assert_eq!(ladder.record(1.0), LadderState::Detected);
    }

    #[test]
    fn adaptive_ladder_exhausts_at_ceiling() {
        let mut ladder = AdaptiveExposure::new(vec![10.0, 20.0], 5.0);
        assert_eq!(ladder.record(f64::NAN), LadderState::Integrating);
        assert_eq!(ladder.record(4.9), LadderState::Exhausted);
        assert_eq!(ladder.current(), None);
        assert_eq!(AdaptiveExposure::new(Vec::new(), 5.0).state(), LadderState::Exhausted);
    }
}
