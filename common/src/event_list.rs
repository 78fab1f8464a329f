use crate::{RtaError, RtaResult, SkyCoord, Time};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};
use tracing::debug;

/// A single reconstructed photon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub ra: f64,
    pub dec: f64,
    /// TeV
    pub energy: f64,
    /// Seconds since the start of the observation.
    pub time: Time,
}

impl Event {
    pub fn position(&self) -> SkyCoord {
        SkyCoord::new(self.ra, self.dec)
    }
}

/// Good time interval, `[start, stop)` in seconds.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gti {
    pub start: Time,
    pub stop: Time,
}

impl Gti {
    pub fn new(start: Time, stop: Time) -> Self {
        Self { start, stop }
    }

    pub fn contains(&self, time: Time) -> bool {
        (self.start..self.stop).contains(&time)
    }

    pub fn duration(&self) -> Time {
        self.stop - self.start
    }
}

/// The photon list of one simulated observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventList {
    pub pointing: SkyCoord,
    pub gti: Gti,
    pub created: DateTime<Utc>,
    pub events: Vec<Event>,
}

impl EventList {
    pub fn new(pointing: SkyCoord, gti: Gti, events: Vec<Event>) -> Self {
        Self {
            pointing,
            gti,
            created: Utc::now(),
            events,
        }
    }

    /// Reads an event list, distinguishing a missing file from an unreadable one.
    pub fn load(path: &Path) -> RtaResult<Self> {
        if !path.is_file() {
            return Err(RtaError::MissingInput(path.to_owned()));
        }
        let reader = BufReader::new(File::open(path)?);
        let list: EventList = serde_json::from_reader(reader).map_err(|source| RtaError::Json {
            path: path.to_owned(),
            source,
        })?;
        debug!("Loaded {} events from {}", list.events.len(), path.display());
        Ok(list)
    }

    pub fn save(&self, path: &Path) -> RtaResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self).map_err(|source| RtaError::Json {
            path: path.to_owned(),
            source,
        })
    }

    /// Concatenates several lists taken at the same pointing, keeping only
    /// events inside `gti`, ordered by arrival time.
    pub fn merge(pointing: SkyCoord, lists: Vec<EventList>, gti: Gti) -> Self {
        let mut events = lists
            .into_iter()
            .flat_map(|list| list.events)
            .filter(|event| gti.contains(event.time))
            .collect::<Vec<_>>();
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self::new(pointing, gti, events)
    }

    /// Delays every event (and the GTI) by `shift` seconds.
    pub fn shift_time(&mut self, shift: Time) {
        for event in &mut self.events {
            event.time += shift;
        }
        self.gti = Gti::new(self.gti.start + shift, self.gti.stop + shift);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
