//! Time management utilities
//!
//! Simulation time is an absolute UTC instant. Time-varying data is described
//! by intervals carrying a payload, collected into sorted interval sets.

use chrono::{DateTime, FixedOffset, Utc};

/// Absolute simulation time
pub type JulianDate = DateTime<Utc>;

/// Errors produced while parsing time descriptions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    /// The interval text was not of the form `start/stop`
    #[error("Invalid ISO 8601 interval: {0}")]
    InvalidInterval(String),

    /// A date-time component could not be parsed
    #[error("Invalid ISO 8601 date: {0}")]
    InvalidDate(String),

    /// The interval stops before it starts
    #[error("Interval stop {stop} precedes start {start}")]
    Inverted {
        /// Parsed start
        start: JulianDate,
        /// Parsed stop
        stop: JulianDate,
    },
}

/// Parse an ISO 8601 date-time with an explicit offset
///
/// Accepts both `+hh:mm` and `+hhmm` offset forms as well as `Z`.
pub fn parse_iso8601(text: &str) -> Result<JulianDate, TimeError> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::<FixedOffset>::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| TimeError::InvalidDate(text.to_string()))
}

/// A span of time carrying a payload
#[derive(Debug, Clone, PartialEq)]
pub struct TimeInterval<T> {
    /// Start of the interval
    pub start: JulianDate,
    /// End of the interval
    pub stop: JulianDate,
    /// Whether `start` itself belongs to the interval
    pub is_start_included: bool,
    /// Whether `stop` itself belongs to the interval
    pub is_stop_included: bool,
    /// Payload valid over the interval
    pub data: T,
}

impl<T> TimeInterval<T> {
    /// Closed interval `[start, stop]`
    pub fn new(start: JulianDate, stop: JulianDate, data: T) -> Self {
        Self {
            start,
            stop,
            is_start_included: true,
            is_stop_included: true,
            data,
        }
    }

    /// Parse a closed interval from `start/stop` ISO 8601 text
    pub fn from_iso8601(text: &str, data: T) -> Result<Self, TimeError> {
        let (start, stop) = text
            .split_once('/')
            .ok_or_else(|| TimeError::InvalidInterval(text.to_string()))?;
        let start = parse_iso8601(start)?;
        let stop = parse_iso8601(stop)?;
        if stop < start {
            return Err(TimeError::Inverted { start, stop });
        }
        Ok(Self::new(start, stop, data))
    }

    /// Check whether `time` falls inside the interval
    pub fn contains(&self, time: JulianDate) -> bool {
        let after_start = if self.is_start_included {
            time >= self.start
        } else {
            time > self.start
        };
        let before_stop = if self.is_stop_included {
            time <= self.stop
        } else {
            time < self.stop
        };
        after_start && before_stop
    }
}

/// Set of intervals kept sorted by start time
#[derive(Debug, Clone, PartialEq)]
pub struct TimeIntervalCollection<T> {
    intervals: Vec<TimeInterval<T>>,
}

impl<T> Default for TimeIntervalCollection<T> {
    fn default() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }
}

impl<T> TimeIntervalCollection<T> {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection from intervals in any order
    pub fn from_intervals(intervals: impl IntoIterator<Item = TimeInterval<T>>) -> Self {
        let mut collection = Self::new();
        for interval in intervals {
            collection.add_interval(interval);
        }
        collection
    }

    /// Insert an interval, keeping the collection ordered by start
    ///
    /// Where intervals overlap, lookups resolve to the earlier-starting one.
    pub fn add_interval(&mut self, interval: TimeInterval<T>) {
        let index = self
            .intervals
            .partition_point(|existing| existing.start <= interval.start);
        self.intervals.insert(index, interval);
    }

    /// Builder form of [`Self::add_interval`]
    pub fn with_interval(mut self, interval: TimeInterval<T>) -> Self {
        self.add_interval(interval);
        self
    }

    /// Number of intervals
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether the collection holds no intervals
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// All intervals in start order
    pub fn intervals(&self) -> &[TimeInterval<T>] {
        &self.intervals
    }

    /// The first interval containing `time`
    pub fn find_interval_containing(&self, time: JulianDate) -> Option<&TimeInterval<T>> {
        let candidates = self.intervals.partition_point(|interval| interval.start <= time);
        self.intervals[..candidates]
            .iter()
            .find(|interval| interval.contains(time))
    }

    /// Payload of the interval containing `time`
    pub fn find_data_for_interval_containing_date(&self, time: JulianDate) -> Option<&T> {
        self.find_interval_containing(time).map(|interval| &interval.data)
    }

    /// Whether any interval contains `time`
    pub fn contains(&self, time: JulianDate) -> bool {
        self.find_interval_containing(time).is_some()
    }
}
