use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::DownsampleError;

/// A Sample is one observation of a series as seen by the downsampler: a
/// timestamp and a value. The implementing type is the payload and is handed
/// back to the caller untouched.
pub trait Sample {
    /// Seconds since the Unix epoch, possibly fractional.
    fn timestamp(&self) -> f64;
    fn value(&self) -> f64;
}

impl Sample for (f64, f64) {
    fn timestamp(&self) -> f64 {
        self.0
    }

    fn value(&self) -> f64 {
        self.1
    }
}

impl Sample for (SystemTime, f64) {
    fn timestamp(&self) -> f64 {
        epoch_seconds(self.0)
    }

    fn value(&self) -> f64 {
        self.1
    }
}

/// Convert a `SystemTime` to fractional seconds since the Unix epoch.
/// Times before the epoch map to negative values.
pub fn epoch_seconds(t: SystemTime) -> f64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Target number of points per downsampled series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Threshold(usize);

impl Threshold {
    pub const DEFAULT: Threshold = Threshold(200);

    pub fn new(points: usize) -> Self {
        Threshold(points)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for Threshold {
    type Error = DownsampleError;

    fn try_from(points: i64) -> Result<Self, Self::Error> {
        usize::try_from(points)
            .map(Threshold)
            .map_err(|_| DownsampleError::InvalidArgument(points.to_string()))
    }
}

impl FromStr for Threshold {
    type Err = DownsampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let points: i64 = s
            .trim()
            .parse()
            .map_err(|_| DownsampleError::InvalidArgument(s.to_string()))?;
        Threshold::try_from(points)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
