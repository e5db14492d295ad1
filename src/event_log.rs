//! Vehicle event log for one sensor-day and timestamp reconstruction.
//!
//! Detectors log every vehicle, but only some lines carry a time of day; the
//! rest carry a headway, or nothing at all. Reconstruction fills in missing
//! timestamps (and headways) with three linear passes, run in order:
//!
//! 1. [`EventLog::propagate_forward`] carries known stamps forward through headways.
//! 2. [`EventLog::propagate_backward`] carries stamps backward to the previous vehicle.
//! 3. [`EventLog::interpolate_gaps`] spreads unresolved runs evenly between known stamps.
//!
//! Events are never reordered. Timestamps and headways are assign-once, so a
//! pass only fills gaps and never overwrites an earlier value.

use std::io::Read;

use tracing::debug;

use crate::error::EventError;
use crate::event::{SensorEvent, Vehicle, parse_line};

/// Added when stepping back from a stamp by a headway. Headways are logged at
/// whole-second resolution, so this lands on the latest consistent millisecond.
pub const HEADWAY_ROUNDING_MS: i64 = 999;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<SensorEvent>,
    reconstructed: bool,
}

impl EventLog {
    pub fn new(events: Vec<SensorEvent>) -> Self {
        Self {
            events,
            reconstructed: false,
        }
    }

    /// Parses a whole `.vlog` text, one event per line.
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines().map(parse_line).collect())
    }

    /// Parses raw `.vlog` bytes. Invalid UTF-8 is replaced rather than rejected.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(bytes))
    }

    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn events(&self) -> &[SensorEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Runs all three reconstruction passes in order. Once a log has been
    /// reconstructed, further calls leave it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NonPositiveHeadway`] if a derived headway is zero
    /// or negative; the whole sensor-day is unusable in that case.
    pub fn reconstruct(&mut self) -> Result<(), EventError> {
        if self.reconstructed {
            debug!("Event log already reconstructed");
            return Ok(());
        }
        self.propagate_forward()?;
        self.propagate_backward();
        self.interpolate_gaps()?;
        debug!(
            events = self.events.len(),
            unresolved = self.unresolved_count(),
            "Event log reconstructed"
        );
        self.reconstructed = true;
        Ok(())
    }

    /// Pass 1: derives stamps from the previous stamp plus headway, and
    /// headways from consecutive stamps. A reset breaks the chain.
    pub fn propagate_forward(&mut self) -> Result<(), EventError> {
        let mut last_stamp = None;
        for (index, event) in self.events.iter_mut().enumerate() {
            match event {
                SensorEvent::Reset => last_stamp = None,
                SensorEvent::Vehicle(v) => {
                    if let Some(previous) = last_stamp {
                        follow(v, previous, index)?;
                    }
                    last_stamp = v.stamp();
                }
            }
        }
        Ok(())
    }

    /// Pass 2: gives an unresolved event the stamp implied by the next
    /// event's stamp and headway.
    pub fn propagate_backward(&mut self) {
        let mut implied = None;
        for event in self.events.iter_mut().rev() {
            match event {
                SensorEvent::Reset => implied = None,
                SensorEvent::Vehicle(v) => {
                    if let Some(stamp) = implied {
                        v.stamp.fill(stamp);
                    }
                    implied = previous_stamp(v);
                }
            }
        }
    }

    /// Pass 3: assigns a uniform headway to each run of unresolved events
    /// bounded by known stamps on both sides.
    ///
    /// A run seen before the first known stamp is discarded without being
    /// assigned, as is a run still open at the end of the log. Those events
    /// stay unresolved and fail [`EventLog::check`]. A reset inside a run
    /// holds one headway slot but is never stamped.
    pub fn interpolate_gaps(&mut self) -> Result<(), EventError> {
        let mut previous: Option<i64> = None;
        let mut run: Vec<usize> = Vec::new();
        for index in 0..self.events.len() {
            let stamp = match &self.events[index] {
                SensorEvent::Reset => None,
                SensorEvent::Vehicle(v) => v.stamp(),
            };
            let Some(stamp) = stamp else {
                run.push(index);
                continue;
            };
            if let Some(mut last) = previous.filter(|_| !run.is_empty()) {
                // Integer division: the headway truncates toward zero.
                let headway = (stamp - last) / (run.len() as i64 + 1);
                for &i in &run {
                    match &mut self.events[i] {
                        SensorEvent::Reset => last += headway,
                        SensorEvent::Vehicle(v) => {
                            fill_headway(v, headway, i)?;
                            follow(v, last, i)?;
                            if let Some(s) = v.stamp() {
                                last = s;
                            }
                        }
                    }
                }
            }
            run.clear();
            previous = Some(stamp);
        }
        if !run.is_empty() {
            debug!(trailing = run.len(), "Unresolved events after last known stamp");
        }
        Ok(())
    }

    /// Verifies every vehicle event has a timestamp.
    pub fn check(&self) -> Result<(), EventError> {
        match self
            .events
            .iter()
            .position(|e| !e.is_reset() && e.timestamp().is_none())
        {
            Some(index) => Err(EventError::UnresolvedTimestamp { index }),
            None => Ok(()),
        }
    }

    fn unresolved_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| !e.is_reset() && e.timestamp().is_none())
            .count()
    }
}

impl FromIterator<SensorEvent> for EventLog {
    fn from_iter<I: IntoIterator<Item = SensorEvent>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Applies the forward-propagation update against the previous vehicle's stamp.
fn follow(v: &mut Vehicle, previous: i64, index: usize) -> Result<(), EventError> {
    if let Some(headway) = v.headway() {
        v.stamp.fill(previous + headway);
    }
    if let Some(stamp) = v.stamp() {
        fill_headway(v, stamp - previous, index)?;
    }
    Ok(())
}

fn fill_headway(v: &mut Vehicle, headway: i64, index: usize) -> Result<(), EventError> {
    if v.headway.is_resolved() {
        return Ok(());
    }
    if headway <= 0 {
        return Err(EventError::NonPositiveHeadway { index, headway });
    }
    v.headway.fill(headway);
    Ok(())
}

fn previous_stamp(v: &Vehicle) -> Option<i64> {
    Some(v.stamp()? - v.headway()? + HEADWAY_ROUNDING_MS)
}
