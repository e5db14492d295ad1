//! Parser for raw vehicle event log (`.vlog`) lines.
//!
//! Each line is `duration,headway,hh:mm:ss,speed` with every field optional by
//! position. A line consisting of `*` marks a detector reset. Fields that fail
//! to parse are treated as absent; parsing a line never fails.

/// A value that starts out unresolved and may be filled in exactly once.
///
/// Later attempts to fill an already resolved value are ignored, so the first
/// value to land (parsed or reconstructed) always wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignOnce<T>(Option<T>);

impl<T: Copy> AssignOnce<T> {
    pub fn resolved(value: T) -> Self {
        Self(Some(value))
    }

    pub fn unresolved() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<T> {
        self.0
    }

    pub fn is_resolved(&self) -> bool {
        self.0.is_some()
    }

    /// Stores `value` unless a value is already present.
    pub(crate) fn fill(&mut self, value: T) {
        if self.0.is_none() {
            self.0 = Some(value);
        }
    }
}

impl<T: Copy> From<Option<T>> for AssignOnce<T> {
    fn from(value: Option<T>) -> Self {
        Self(value)
    }
}

/// One vehicle detection. Times are milliseconds, speed is mph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vehicle {
    pub duration: Option<i64>,
    pub(crate) headway: AssignOnce<i64>,
    pub(crate) stamp: AssignOnce<i64>,
    pub speed: Option<i64>,
}

impl Vehicle {
    pub fn new(
        duration: Option<i64>,
        headway: Option<i64>,
        stamp: Option<i64>,
        speed: Option<i64>,
    ) -> Self {
        Self {
            duration,
            headway: headway.into(),
            stamp: stamp.into(),
            speed,
        }
    }

    pub fn headway(&self) -> Option<i64> {
        self.headway.get()
    }

    pub fn stamp(&self) -> Option<i64> {
        self.stamp.get()
    }
}

/// One parsed log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorEvent {
    Reset,
    Vehicle(Vehicle),
}

impl SensorEvent {
    pub fn is_reset(&self) -> bool {
        matches!(self, SensorEvent::Reset)
    }

    pub fn vehicle(&self) -> Option<&Vehicle> {
        match self {
            SensorEvent::Vehicle(v) => Some(v),
            SensorEvent::Reset => None,
        }
    }

    pub fn duration(&self) -> Option<i64> {
        self.vehicle().and_then(|v| v.duration)
    }

    pub fn headway(&self) -> Option<i64> {
        self.vehicle().and_then(|v| v.headway.get())
    }

    /// Milliseconds since local midnight, once resolved.
    pub fn timestamp(&self) -> Option<i64> {
        self.vehicle().and_then(|v| v.stamp.get())
    }

    pub fn speed(&self) -> Option<i64> {
        self.vehicle().and_then(|v| v.speed)
    }
}

/// Parses one event log line.
pub fn parse_line(line: &str) -> SensorEvent {
    let line = line.trim();
    if line == "*" {
        return SensorEvent::Reset;
    }
    let mut fields = line.split(',');
    let duration = fields.next().and_then(parse_int);
    let headway = fields.next().and_then(parse_int);
    let stamp = fields.next().and_then(parse_time_of_day);
    let speed = fields.next().and_then(parse_int);
    SensorEvent::Vehicle(Vehicle::new(duration, headway, stamp, speed))
}

fn parse_int(field: &str) -> Option<i64> {
    field.parse::<i32>().ok().map(i64::from)
}

/// Converts `hh:mm:ss` into milliseconds since midnight.
pub fn parse_time_of_day(field: &str) -> Option<i64> {
    let mut parts = field.split(':');
    let (h, m, s) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let hour: i64 = h.parse().ok()?;
    let minute: i64 = m.parse().ok()?;
    let second: i64 = s.parse().ok()?;
    if !(0..=23).contains(&hour) || !(0..=59).contains(&minute) || !(0..=59).contains(&second) {
        return None;
    }
    Some((hour * 3600 + minute * 60 + second) * 1000)
}
