use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::SensorEvent;
use crate::event_log::EventLog;

#[derive(Debug, Default, Serialize)]
pub struct LogStats {
    pub generated_at: DateTime<Utc>,
    pub sensor: Option<String>,
    pub date: Option<String>,
    pub stage: Option<String>,
    pub total_events: usize,

    // event types
    pub resets: usize,
    pub vehicles: usize,

    // vehicle fields
    pub with_duration: usize,
    pub with_headway: usize,
    pub with_timestamp: usize,
    pub with_speed: usize,
}

impl LogStats {
    pub fn from_log(log: &EventLog) -> Self {
        let mut s = LogStats {
            generated_at: Utc::now(),
            total_events: log.len(),
            ..Default::default()
        };

        for e in log.events() {
            let v = match e {
                SensorEvent::Reset => {
                    s.resets += 1;
                    continue;
                }
                SensorEvent::Vehicle(v) => v,
            };
            s.vehicles += 1;

            if v.duration.is_some() {
                s.with_duration += 1;
            }

            if v.headway().is_some() {
                s.with_headway += 1;
            }

            if v.stamp().is_some() {
                s.with_timestamp += 1;
            }

            if v.speed.is_some() {
                s.with_speed += 1;
            }
        }

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn timestamp_pct(&self) -> f64 {
        Self::pct(self.with_timestamp, self.vehicles)
    }

    /// Set sensor-day metadata
    pub fn with_sensor_info(mut self, sensor: &str, date: &str) -> Self {
        self.sensor = Some(sensor.to_string());
        self.date = Some(date.to_string());
        self
    }

    /// Label the reconstruction stage the counts were taken at
    pub fn with_stage(mut self, stage: &str) -> Self {
        self.stage = Some(stage.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(LogStats::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(LogStats::pct(50, 100), 50.0);
        assert_eq!(LogStats::pct(1, 4), 25.0);
    }

    #[test]
    fn test_from_log_empty() {
        let stats = LogStats::from_log(&EventLog::default());
        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.vehicles, 0);
        assert_eq!(stats.timestamp_pct(), 0.0);
    }

    #[test]
    fn test_from_log_counts_fields() {
        let log = EventLog::parse("10,5000,00:00:05,30\n*\n12,1000\n,,,55\n");
        let stats = LogStats::from_log(&log);

        assert_eq!(stats.total_events, 4);
        assert_eq!(stats.resets, 1);
        assert_eq!(stats.vehicles, 3);
        assert_eq!(stats.with_duration, 2);
        assert_eq!(stats.with_headway, 2);
        assert_eq!(stats.with_timestamp, 1);
        assert_eq!(stats.with_speed, 2);
    }

    #[test]
    fn test_reconstruction_raises_timestamp_coverage() {
        let mut log = EventLog::parse("10,,00:00:05\n10,2000\n10,3000\n");
        let before = LogStats::from_log(&log);
        log.reconstruct().unwrap();
        let after = LogStats::from_log(&log).with_stage("reconstructed");

        assert_eq!(before.with_timestamp, 1);
        assert_eq!(after.with_timestamp, 3);
        assert_eq!(after.timestamp_pct(), 100.0);
        assert_eq!(after.stage.as_deref(), Some("reconstructed"));
    }

    #[test]
    fn test_with_sensor_info() {
        let stats = LogStats::default().with_sensor_info("det1", "20230101");
        assert_eq!(stats.sensor.as_deref(), Some("det1"));
        assert_eq!(stats.date.as_deref(), Some("20230101"));
    }
}
