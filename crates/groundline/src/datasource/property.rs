//! Time-varying property values

use crate::foundation::time::{JulianDate, TimeInterval, TimeIntervalCollection};

/// A value that is either constant or defined piecewise over time
#[derive(Debug, Clone, PartialEq)]
pub enum Property<T> {
    /// Same value at every time
    Constant(T),
    /// Value defined by the interval containing the sample time
    Intervals(TimeIntervalCollection<T>),
}

impl<T: Clone> Property<T> {
    /// Sample at `time`; `None` outside every interval
    pub fn value(&self, time: JulianDate) -> Option<T> {
        match self {
            Self::Constant(value) => Some(value.clone()),
            Self::Intervals(intervals) => intervals
                .find_data_for_interval_containing_date(time)
                .cloned(),
        }
    }

    /// Sample at `time`, falling back to `default` where undefined
    pub fn value_or(&self, time: JulianDate, default: T) -> T {
        self.value(time).unwrap_or(default)
    }
}

impl<T> Property<T> {
    /// Whether the value can never change over time
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    /// Property defined by a single interval
    pub fn from_interval(interval: TimeInterval<T>) -> Self {
        Self::Intervals(TimeIntervalCollection::new().with_interval(interval))
    }
}

impl<T> From<T> for Property<T> {
    fn from(value: T) -> Self {
        Self::Constant(value)
    }
}

/// Whether an optional property is absent or constant
pub fn is_constant<T>(property: Option<&Property<T>>) -> bool {
    property.map_or(true, Property::is_constant)
}

/// Camera distance range over which geometry is displayed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceDisplayCondition {
    /// Smallest distance at which the geometry is visible
    pub near: f64,
    /// Largest distance at which the geometry is visible
    pub far: f64,
}

impl DistanceDisplayCondition {
    /// Create a condition for `[near, far]`
    pub fn new(near: f64, far: f64) -> Self {
        Self { near, far }
    }

    /// Encoding used by the per-instance attribute
    pub fn to_attribute_value(self) -> [f64; 2] {
        [self.near, self.far]
    }
}

impl Default for DistanceDisplayCondition {
    fn default() -> Self {
        Self {
            near: 0.0,
            far: f64::INFINITY,
        }
    }
}
