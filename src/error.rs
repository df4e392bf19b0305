//! Error types for reading normalization and aggregation.

/// a raw record that cannot be turned into a [`crate::domain::Reading`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadingError {
    /// a numeric field is not finite or falls outside the representable range
    #[error("malformed reading: {field} = {value}")]
    MalformedReading {
        /// name of the offending field
        field: &'static str,
        /// the value as received
        value: f64,
    },
}

impl ReadingError {
    pub fn malformed(field: &'static str, value: f64) -> Self {
        Self::MalformedReading { field, value }
    }
}

pub type Result<T> = std::result::Result<T, ReadingError>;
