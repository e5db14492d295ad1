//! Bins a reconstructed event log into 30-second summary channels.

use crate::error::EventError;
use crate::event::SensorEvent;
use crate::event_log::EventLog;

/// Number of 30-second periods in a day.
pub const SAMPLES_PER_DAY: usize = 2880;

/// Length of one sample period (ms).
pub const PERIOD_MS: i64 = 30_000;

/// Sample value meaning "no data for this period".
pub const MISSING_DATA: i8 = -1;

/// Largest summary value a byte channel can hold.
const MAX_SAMPLE: i64 = i8::MAX as i64;

/// The measurements that can be derived from a vehicle event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Vehicle count per period.
    Volume,
    /// Mean vehicle speed per period (mph).
    Speed,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 2] = [ChannelKind::Volume, ChannelKind::Speed];

    /// Archive file extension, including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ChannelKind::Volume => ".v30",
            ChannelKind::Speed => ".s30",
        }
    }

    /// Channel kind for a sample file name, if it can be derived from a `.vlog`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| name.ends_with(k.extension()))
    }

    fn summarize(&self, acc: &PeriodAccumulator) -> Option<i8> {
        match self {
            ChannelKind::Volume => acc.volume(),
            ChannelKind::Speed => acc.speed(),
        }
    }
}

/// Running totals for the period currently being binned.
#[derive(Debug, Default)]
struct PeriodAccumulator {
    period: Option<usize>,
    reset: bool,
    volume: i64,
    speed_sum: i64,
    speed_count: i64,
}

impl PeriodAccumulator {
    fn clear(&mut self, period: usize) {
        *self = PeriodAccumulator {
            period: Some(period),
            ..Default::default()
        };
    }

    fn add(&mut self, speed: Option<i64>) {
        self.volume += 1;
        if let Some(s) = speed {
            self.speed_sum += s;
            self.speed_count += 1;
        }
    }

    fn volume(&self) -> Option<i8> {
        if self.reset || self.volume > MAX_SAMPLE {
            return None;
        }
        i8::try_from(self.volume).ok()
    }

    fn speed(&self) -> Option<i8> {
        if self.reset || self.speed_count == 0 {
            return None;
        }
        let mean = self.speed_sum / self.speed_count;
        if (0..=MAX_SAMPLE).contains(&mean) {
            i8::try_from(mean).ok()
        } else {
            None
        }
    }
}

/// One day of 30-second samples for a single measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    kind: ChannelKind,
    samples: Vec<i8>,
}

impl Channel {
    /// Creates a channel with every period missing.
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            samples: vec![MISSING_DATA; SAMPLES_PER_DAY],
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn samples(&self) -> &[i8] {
        &self.samples
    }

    /// Sample value for `period`, or `None` when missing or out of range.
    pub fn get(&self, period: usize) -> Option<u8> {
        self.samples
            .get(period)
            .and_then(|&s| u8::try_from(s).ok())
    }

    /// Archive encoding: one signed byte per period.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.samples.iter().map(|&s| s as u8).collect()
    }

    fn record(&mut self, acc: &PeriodAccumulator) {
        if let Some(period) = acc.period {
            if let Some(value) = self.kind.summarize(acc) {
                self.samples[period] = value;
            }
        }
    }
}

/// Period index for a timestamp (ms since midnight).
pub fn period_of(stamp: i64) -> Option<usize> {
    let period = stamp / PERIOD_MS;
    usize::try_from(period)
        .ok()
        .filter(|p| *p < SAMPLES_PER_DAY)
}

/// Bins a reconstructed log into a channel of the requested kind.
///
/// Periods between the first and last detection with no vehicles get a real
/// zero; periods outside that span stay missing. A reset marks the period it
/// falls in as missing.
///
/// # Errors
///
/// Fails with [`EventError::UnresolvedTimestamp`] if any vehicle event has no
/// timestamp, or [`EventError::PeriodOutOfRange`] if a timestamp falls outside
/// the day.
pub fn bin(log: &EventLog, kind: ChannelKind) -> Result<Channel, EventError> {
    log.check()?;
    let mut channel = Channel::new(kind);
    let mut acc = PeriodAccumulator::default();
    for (index, event) in log.events().iter().enumerate() {
        let vehicle = match event {
            SensorEvent::Reset => {
                acc.reset = true;
                continue;
            }
            SensorEvent::Vehicle(v) => v,
        };
        let stamp = vehicle
            .stamp()
            .ok_or(EventError::UnresolvedTimestamp { index })?;
        let period = period_of(stamp).ok_or(EventError::PeriodOutOfRange { index, stamp })?;
        match acc.period {
            None => acc.clear(period),
            Some(mut current) => {
                while current < period {
                    channel.record(&acc);
                    current += 1;
                    acc.clear(current);
                }
            }
        }
        acc.add(vehicle.speed);
    }
    channel.record(&acc);
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binned(text: &str, kind: ChannelKind) -> Channel {
        let mut log = EventLog::parse(text);
        log.reconstruct().unwrap();
        bin(&log, kind).unwrap()
    }

    #[test]
    fn test_volume_counts_per_period() {
        let ch = binned("5,,00:00:05\n5,,00:00:10\n5,,00:00:40\n", ChannelKind::Volume);
        assert_eq!(ch.get(0), Some(2));
        assert_eq!(ch.get(1), Some(1));
        assert_eq!(ch.get(2), None);
        assert_eq!(ch.samples().len(), SAMPLES_PER_DAY);
    }

    #[test]
    fn test_empty_period_between_detections_is_zero() {
        let ch = binned("5,,00:00:05\n5,,00:01:35\n", ChannelKind::Volume);
        assert_eq!(&ch.samples()[..5], &[1, 0, 0, 1, MISSING_DATA]);
    }

    #[test]
    fn test_periods_outside_detections_are_missing() {
        let ch = binned("5,,00:01:00\n5,,00:01:10\n", ChannelKind::Volume);
        assert_eq!(&ch.samples()[..4], &[MISSING_DATA, MISSING_DATA, 2, MISSING_DATA]);
        assert_eq!(ch.samples()[SAMPLES_PER_DAY - 1], MISSING_DATA);
    }

    #[test]
    fn test_speed_mean_truncates() {
        let ch = binned("5,,00:00:05,30\n5,,00:00:06,31\n", ChannelKind::Speed);
        assert_eq!(ch.get(0), Some(30));
    }

    #[test]
    fn test_speed_without_samples_is_missing() {
        let text = "5,,00:00:05\n5,,00:00:35,40\n";
        assert_eq!(binned(text, ChannelKind::Speed).get(0), None);
        assert_eq!(binned(text, ChannelKind::Speed).get(1), Some(40));
        assert_eq!(binned(text, ChannelKind::Volume).get(0), Some(1));
    }

    #[test]
    fn test_speed_out_of_range_is_missing() {
        let ch = binned("5,,00:00:05,200\n5,,00:00:35,-4\n", ChannelKind::Speed);
        assert_eq!(ch.get(0), None);
        assert_eq!(ch.get(1), None);
    }

    #[test]
    fn test_reset_marks_only_its_period() {
        let text = "5,,00:00:05,30\n*\n5,,00:00:40,30\n5,,00:01:10,30\n";
        let vol = binned(text, ChannelKind::Volume);
        assert_eq!(vol.get(0), None);
        assert_eq!(vol.get(1), Some(1));
        assert_eq!(vol.get(2), Some(1));
        assert_eq!(binned(text, ChannelKind::Speed).get(0), None);
    }

    #[test]
    fn test_volume_cap() {
        let full = format!("5,,00:00:00\n{}", "5,100\n".repeat(126));
        assert_eq!(binned(&full, ChannelKind::Volume).get(0), Some(127));
        let over = format!("5,,00:00:00\n{}", "5,100\n".repeat(127));
        assert_eq!(binned(&over, ChannelKind::Volume).get(0), None);
    }

    #[test]
    fn test_period_out_of_range() {
        let mut log = EventLog::parse("5,,23:59:59\n5,5000,,\n");
        log.reconstruct().unwrap();
        assert_eq!(
            bin(&log, ChannelKind::Volume),
            Err(EventError::PeriodOutOfRange {
                index: 1,
                stamp: 86_404_000
            })
        );
    }

    #[test]
    fn test_unresolved_timestamp_fails() {
        let log = EventLog::parse("5,,00:00:05\n5,,,\n");
        assert_eq!(
            bin(&log, ChannelKind::Volume),
            Err(EventError::UnresolvedTimestamp { index: 1 })
        );
    }

    #[test]
    fn test_lone_reset_yields_all_missing() {
        let ch = binned("*\n", ChannelKind::Volume);
        assert!(ch.samples().iter().all(|&s| s == MISSING_DATA));
    }

    #[test]
    fn test_last_period_of_day() {
        let ch = binned("5,,23:59:45\n", ChannelKind::Volume);
        assert_eq!(ch.get(SAMPLES_PER_DAY - 1), Some(1));
    }

    #[test]
    fn test_to_bytes_encodes_missing_as_ff() {
        let bytes = binned("5,,00:00:05\n", ChannelKind::Volume).to_bytes();
        assert_eq!(bytes.len(), SAMPLES_PER_DAY);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[1], 0xFF);
    }

    #[test]
    fn test_kind_from_file_name() {
        assert_eq!(ChannelKind::from_file_name("det1.v30"), Some(ChannelKind::Volume));
        assert_eq!(ChannelKind::from_file_name("det1.s30"), Some(ChannelKind::Speed));
        assert_eq!(ChannelKind::from_file_name("det1.c30"), None);
        assert_eq!(ChannelKind::from_file_name("det1.vlog"), None);
    }

    #[test]
    fn test_period_of() {
        assert_eq!(period_of(0), Some(0));
        assert_eq!(period_of(29_999), Some(0));
        assert_eq!(period_of(30_000), Some(1));
        assert_eq!(period_of(86_399_999), Some(2879));
        assert_eq!(period_of(86_400_000), None);
        assert_eq!(period_of(-30_000), None);
    }
}
