use crate::regions::{RegionSet, SkyRegion};
use rta_common::{Event, Time};

/// Half-open energy (TeV) and time (s) windows an event must fall in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventSelection {
    pub energy_min: f64,
    pub energy_max: f64,
    pub time_min: Time,
    pub time_max: Time,
}

impl EventSelection {
    pub fn new((energy_min, energy_max): (f64, f64), (time_min, time_max): (Time, Time)) -> Self {
        Self {
            energy_min,
            energy_max,
            time_min,
            time_max,
        }
    }

    pub fn accepts(&self, event: &Event) -> bool {
        (self.energy_min..self.energy_max).contains(&event.energy)
            && (self.time_min..self.time_max).contains(&event.time)
    }
}

/// Number of selected events inside `region`. A region without positive
/// radius holds nothing.
pub fn count(events: &[Event], region: &SkyRegion, selection: &EventSelection) -> u64 {
    if !(region.radius > 0.0) {
        return 0;
    }
    events
        .iter()
        .filter(|event| selection.accepts(event) && region.contains(&event.position()))
        .count() as u64
}

/// On counts and per-region off counts for one window.
pub fn count_regions(events: &[Event], regions: &RegionSet, selection: &EventSelection) -> (u64, Vec<u64>) {
    let on = count(events, &regions.on, selection);
    let off = regions
        .off
        .iter()
        .map(|region| count(events, region, selection))
        .collect();
    (on, off)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rta_common::SkyCoord;

    fn event(ra: f64, dec: f64, energy: f64, time: Time) -> Event {
        Event {
            ra,
            dec,
            energy,
            time,
        }
    }

    fn selection() -> EventSelection {
        EventSelection::new((0.04, 1.0), (0.0, 100.0))
    }

    #[test]
    fn empty_list_counts_nothing() {
        let region = SkyRegion::new(SkyCoord::new(10.0, 10.0), 0.2);
        assert_eq!(count(&[], &region, &selection()), 0);
    }

    #[test]
    fn zero_radius_counts_nothing() {
        let events = [event(10.0, 10.0, 0.5, 1.0)];
        let region = SkyRegion::new(SkyCoord::new(10.0, 10.0), 0.0);
        assert_eq!(count(&events, &region, &selection()), 0);
        let region = SkyRegion::new(SkyCoord::new(10.0, 10.0), -1.0);
        assert_eq!(count(&events, &region, &selection()), 0);
    }

    #[test]
    fn windows_are_half_open() {
        let region = SkyRegion::new(SkyCoord::new(10.0, 10.0), 0.2);
        let events = [
            event(10.0, 10.0, 0.04, 0.0),
            event(10.0, 10.0, 1.0, 50.0),
            event(10.0, 10.0, 0.5, 100.0),
            event(10.0, 10.1, 0.5, 99.9),
            event(10.0, 10.3, 0.5, 50.0),
        ];
        assert_eq!(count(&events, &region, &selection()), 2);
    }

    #[test]
    fn counts_per_region() {
        let regions = RegionSet {
            on: SkyRegion::new(SkyCoord::new(10.0, 10.0), 0.2),
            off: vec![
                SkyRegion::new(SkyCoord::new(10.0, 9.0), 0.2),
                SkyRegion::new(SkyCoord::new(10.0, 11.0), 0.2),
            ],
        };
        let events = [
            event(10.0, 10.05, 0.5, 1.0),
            event(10.0, 9.05, 0.5, 2.0),
            event(10.0, 8.95, 0.5, 3.0),
            event(10.0, 11.0, 0.5, 4.0),
        ];
        assert_eq!(count_regions(&events, &regions, &selection()), (1, vec![2, 1]));
    }
}
