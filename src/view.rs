//! ==============================================================================
//! view.rs - read model for the dashboard
//! ==============================================================================
//!
//! purpose:
//!     derives what the dashboard shows from an AggregationState snapshot:
//!     - the header (last reading + "time since" label)
//!     - one history list per metric, most recent day first
//!
//! relationships:
//!     - reads: aggregate.rs (AggregationState)
//!     - used by: server.rs (json api + html page)
//!
//! ==============================================================================

use crate::aggregate::{AggregationState, DayBucket, GlobalExtrema};
use crate::domain::{DayKey, Reading};

use chrono::{DateTime, Utc};
use serde::Serialize;

const MINUTES_IN_DAY: i64 = 1440;
const MINUTES_IN_ALMOST_TWO_DAYS: i64 = 2520;
const MINUTES_IN_MONTH: i64 = 43200;
const MINUTES_IN_TWO_MONTHS: i64 = 86400;

/// placeholder shown while no reading has arrived
pub const PLACEHOLDER: &str = "--";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    Humidity,
}

impl Metric {
    pub fn suffix(self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
        }
    }

    fn of(self, reading: &Reading) -> i32 {
        match self {
            Metric::Temperature => reading.temperature,
            Metric::Humidity => reading.humidity,
        }
    }

    fn bounds(self, bucket: &DayBucket) -> (i32, i32) {
        match self {
            Metric::Temperature => (bucket.min_temperature, bucket.max_temperature),
            Metric::Humidity => (bucket.min_humidity, bucket.max_humidity),
        }
    }

    fn totals(self, extrema: &GlobalExtrema) -> (i32, i32) {
        match self {
            Metric::Temperature => (extrema.total_min_temperature, extrema.total_max_temperature),
            Metric::Humidity => (extrema.total_min_humidity, extrema.total_max_humidity),
        }
    }
}

/// one chart sample
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub x: DateTime<Utc>,
    pub y: i32,
}

/// one day of one metric, with the global range for scaling
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub day: DayKey,
    /// timestamp of the first reading that arrived for the day
    pub date: DateTime<Utc>,
    pub min: i32,
    pub max: i32,
    pub total_min: i32,
    pub total_max: i32,
    pub points: Vec<ChartPoint>,
}

/// history of one metric, most recent day first
pub fn history(state: &AggregationState, metric: Metric) -> Vec<HistoryEntry> {
    let (total_min, total_max) = metric.totals(&state.extrema);

    state
        .buckets()
        .rev()
        .filter_map(|(day, bucket)| {
            let date = bucket.first_timestamp()?;
            let (min, max) = metric.bounds(bucket);
            Some(HistoryEntry {
                day: day.clone(),
                date,
                min,
                max,
                total_min,
                total_max,
                points: bucket
                    .readings
                    .iter()
                    .map(|r| ChartPoint { x: r.timestamp, y: metric.of(r) })
                    .collect(),
            })
        })
        .collect()
}

pub fn temperature_history(state: &AggregationState) -> Vec<HistoryEntry> {
    history(state, Metric::Temperature)
}

pub fn humidity_history(state: &AggregationState) -> Vec<HistoryEntry> {
    history(state, Metric::Humidity)
}

/// the header row: latest values and how long ago they arrived
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Header {
    pub temperature: String,
    pub humidity: String,
    pub voltage: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub since: Option<String>,
}

impl Header {
    pub fn from_state(state: &AggregationState, now: DateTime<Utc>) -> Self {
        match &state.last_reading {
            Some(reading) => Self {
                temperature: reading.temperature.to_string(),
                humidity: reading.humidity.to_string(),
                voltage: reading.voltage.clone(),
                timestamp: Some(reading.timestamp),
                since: Some(format_distance(reading.timestamp, now)),
            },
            None => Self {
                temperature: PLACEHOLDER.to_string(),
                humidity: PLACEHOLDER.to_string(),
                voltage: String::new(),
                timestamp: None,
                since: None,
            },
        }
    }
}

/// human readable distance between two instants ("5 minutes", "about 2 hours")
///
/// the order of the arguments does not matter. months count as 30 days.
pub fn format_distance(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    let seconds = (to - from).num_seconds().abs();
    let minutes = (seconds as f64 / 60.0).round() as i64;

    if minutes < 2 {
        return if minutes == 0 { "less than a minute".to_string() } else { "1 minute".to_string() };
    }
    if minutes < 45 {
        return format!("{minutes} minutes");
    }
    if minutes < 90 {
        return "about 1 hour".to_string();
    }
    if minutes < MINUTES_IN_DAY {
        let hours = (minutes as f64 / 60.0).round() as i64;
        return format!("about {}", plural(hours, "hour"));
    }
    if minutes < MINUTES_IN_ALMOST_TWO_DAYS {
        return "1 day".to_string();
    }
    if minutes < MINUTES_IN_MONTH {
        let days = (minutes as f64 / MINUTES_IN_DAY as f64).round() as i64;
        return plural(days, "day");
    }
    if minutes < MINUTES_IN_TWO_MONTHS {
        let months = (minutes as f64 / MINUTES_IN_MONTH as f64).round() as i64;
        return format!("about {}", plural(months, "month"));
    }

    // months are 30 days here, not calendar months
    let months = minutes / MINUTES_IN_MONTH;
    if months < 12 {
        let nearest = (minutes as f64 / MINUTES_IN_MONTH as f64).round() as i64;
        return plural(nearest, "month");
    }

    let years = months / 12;
    match months % 12 {
        0..=2 => format!("about {}", plural(years, "year")),
        3..=8 => format!("over {}", plural(years, "year")),
        _ => format!("almost {}", plural(years + 1, "year")),
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 { format!("1 {unit}") } else { format!("{count} {unit}s") }
}
