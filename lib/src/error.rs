use thiserror::Error;

/// Errors raised by the downsampler and its threshold parameter.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DownsampleError {
    /// The threshold could not be turned into a point count.
    #[error("invalid threshold: {0} (must be an integer >= 0)")]
    InvalidArgument(String),

    /// A sample's timestamp or value is not a finite number.
    #[error("malformed sample at index {index}: {field} is not a finite number")]
    MalformedInput {
        /// Position of the offending sample in the input series.
        index: usize,
        /// Which coordinate was bad, "timestamp" or "value".
        field: &'static str,
    },
}

/// An input line that could not be decoded into a scan record. The line is
/// consumed, so decoding can carry on with the next one.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("bad record {line:?}: {reason}")]
pub struct BadRecord {
    pub line: String,
    pub reason: String,
}
