//! ==============================================================================
//! domain.rs - reading types shared by every layer
//! ==============================================================================
//!
//! purpose:
//!     defines the raw record pushed by the greenhouse sensor, the normalized
//!     reading the aggregator works with, and the calendar day key used to
//!     bucket readings.
//!
//! relationships:
//!     - produced by: feed.rs (decodes database records into RawReading)
//!     - consumed by: normalize.rs (RawReading -> Reading)
//!     - consumed by: aggregate.rs (Reading + DayKey)
//!
//! ==============================================================================

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// a record exactly as the sensor pushed it to the database
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// seconds since the unix epoch
    ///
    /// the firmware pushes this as a string, older records carry a number.
    /// a missing value decodes as 0, which the aggregator treats as bad data.
    #[serde(default, deserialize_with = "number_or_string")]
    pub epoch_time: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
    /// temperature in celsius
    pub temperature: f64,
    /// battery voltage in millivolts
    pub voltage: f64,
}

impl RawReading {
    pub fn new(epoch_time: f64, humidity: f64, temperature: f64, voltage: f64) -> Self {
        Self { epoch_time, humidity, temperature, voltage }
    }
}

fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("epoch_time is not numeric: {s:?}"))),
    }
}

/// a normalized reading
///
/// humidity and temperature are whole numbers, voltage is volts rendered
/// with two decimals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub humidity: i32,
    pub temperature: i32,
    pub voltage: String,
}

/// which clock turns a timestamp into a calendar day
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayBoundary {
    #[default]
    Utc,
    Local,
}

/// calendar date key (`YYYY-MM-DD`) of a day bucket
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DayKey(String);

impl DayKey {
    /// derives the key of `timestamp` on the given clock
    pub fn of(timestamp: DateTime<Utc>, boundary: DayBoundary) -> Self {
        let date = match boundary {
            DayBoundary::Utc => timestamp.date_naive(),
            DayBoundary::Local => timestamp.with_timezone(&Local).date_naive(),
        };
        Self(date.format("%Y-%m-%d").to_string())
    }

    /// key produced by a zero epoch timestamp, used as a bad-data marker
    pub fn sentinel(boundary: DayBoundary) -> Self {
        Self::of(DateTime::<Utc>::UNIX_EPOCH, boundary)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
