//! ==============================================================================
//! aggregate.rs - incremental reading aggregation
//! ==============================================================================
//!
//! purpose:
//!     folds the two reading feeds into one AggregationState:
//!     - last_reading: whatever the "latest" feed delivered most recently
//!     - buckets: per calendar day extrema plus every reading of that day
//!     - extrema: running min/max over every bucketed reading
//!
//! updates:
//!     value based: a new DayBucket / GlobalExtrema is computed
//!     from the old one and swapped in. the result for any day only depends
//!     on the set of readings recorded for it, never on their arrival order.
//!
//! relationships:
//!     - uses: normalize.rs (RawReading -> Reading)
//!     - written by: feed.rs (Aggregator task, the only writer)
//!     - read by: view.rs, server.rs (snapshots)
//!
//! ==============================================================================

use crate::domain::{DayBoundary, DayKey, RawReading, Reading};
use crate::error::Result;
use crate::normalize::normalize;

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

// ==============================================================================
// day bucket
// ==============================================================================

/// statistics and readings of one calendar day
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub max_temperature: i32,
    pub min_temperature: i32,
    pub max_humidity: i32,
    pub min_humidity: i32,
    /// readings in arrival order (late readings are appended, not sorted in)
    pub readings: Vec<Reading>,
}

impl DayBucket {
    /// a bucket holding a single reading
    pub fn seeded(reading: Reading) -> Self {
        Self {
            max_temperature: reading.temperature,
            min_temperature: reading.temperature,
            max_humidity: reading.humidity,
            min_humidity: reading.humidity,
            readings: vec![reading],
        }
    }

    /// this bucket with one more reading folded in
    pub fn with_reading(mut self, reading: Reading) -> Self {
        self.max_temperature = highest(reading.temperature, self.max_temperature);
        self.min_temperature = lowest(reading.temperature, self.min_temperature);
        self.max_humidity = highest(reading.humidity, self.max_humidity);
        self.min_humidity = lowest(reading.humidity, self.min_humidity);
        self.readings.push(reading);
        self
    }

    /// timestamp of the first reading that arrived for this day
    pub fn first_timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.readings.first().map(|r| r.timestamp)
    }
}

// ties keep the existing extreme
fn highest(candidate: i32, current: i32) -> i32 {
    if candidate > current { candidate } else { current }
}

fn lowest(candidate: i32, current: i32) -> i32 {
    if candidate < current { candidate } else { current }
}

// ==============================================================================
// global extrema
// ==============================================================================

/// running min/max over every bucketed reading
///
/// starts at the i32 sentinels so the first reading sets all four bounds.
/// max fields only grow, min fields only shrink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalExtrema {
    pub total_max_temperature: i32,
    pub total_min_temperature: i32,
    pub total_max_humidity: i32,
    pub total_min_humidity: i32,
}

impl Default for GlobalExtrema {
    fn default() -> Self {
        Self {
            total_max_temperature: i32::MIN,
            total_min_temperature: i32::MAX,
            total_max_humidity: i32::MIN,
            total_min_humidity: i32::MAX,
        }
    }
}

impl GlobalExtrema {
    pub fn observe(self, temperature: i32, humidity: i32) -> Self {
        Self {
            total_max_temperature: highest(temperature, self.total_max_temperature),
            total_min_temperature: lowest(temperature, self.total_min_temperature),
            total_max_humidity: highest(humidity, self.total_max_humidity),
            total_min_humidity: lowest(humidity, self.total_min_humidity),
        }
    }

    /// true until the first reading has been observed
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }
}

// the sentinels are not meaningful values; expose them as null until set
impl Serialize for GlobalExtrema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire {
            total_max_temperature: Option<i32>,
            total_min_temperature: Option<i32>,
            total_max_humidity: Option<i32>,
            total_min_humidity: Option<i32>,
        }

        let set = !self.is_unset();
        Wire {
            total_max_temperature: set.then_some(self.total_max_temperature),
            total_min_temperature: set.then_some(self.total_min_temperature),
            total_max_humidity: set.then_some(self.total_max_humidity),
            total_min_humidity: set.then_some(self.total_min_humidity),
        }
        .serialize(serializer)
    }
}

// ==============================================================================
// aggregation state
// ==============================================================================

/// the whole aggregate, as consumers see it
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregationState {
    /// None until the latest feed delivers something
    pub last_reading: Option<Reading>,
    pub extrema: GlobalExtrema,
    order: Vec<DayKey>,
    buckets: HashMap<DayKey, DayBucket>,
}

impl AggregationState {
    /// buckets in the order their day was first seen
    pub fn buckets(&self) -> impl DoubleEndedIterator<Item = (&DayKey, &DayBucket)> + '_ {
        self.order.iter().filter_map(|key| self.buckets.get(key).map(|b| (key, b)))
    }

    pub fn bucket(&self, key: &DayKey) -> Option<&DayBucket> {
        self.buckets.get(key)
    }

    pub fn bucket_count(&self) -> usize {
        self.order.len()
    }

    /// number of readings across all buckets
    pub fn reading_count(&self) -> usize {
        self.buckets.values().map(|b| b.readings.len()).sum()
    }
}

impl Serialize for AggregationState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            last_reading: &'a Option<Reading>,
            extrema: &'a GlobalExtrema,
            buckets: Vec<BucketWire<'a>>,
        }

        #[derive(Serialize)]
        struct BucketWire<'a> {
            day: &'a DayKey,
            #[serde(flatten)]
            bucket: &'a DayBucket,
        }

        Wire {
            last_reading: &self.last_reading,
            extrema: &self.extrema,
            buckets: self.buckets().map(|(day, bucket)| BucketWire { day, bucket }).collect(),
        }
        .serialize(serializer)
    }
}

// ==============================================================================
// store
// ==============================================================================

/// what record_historical did with a reading
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recorded {
    /// first reading of a new day
    NewDay(DayKey),
    /// appended to an existing day
    Appended(DayKey),
    /// dropped as bad data (timestamp decoded to the epoch day)
    Dropped,
}

/// owner and sole writer of the AggregationState
#[derive(Debug)]
pub struct AggregationStore {
    boundary: DayBoundary,
    sentinel: DayKey,
    state: AggregationState,
}

impl AggregationStore {
    pub fn new(boundary: DayBoundary) -> Self {
        Self {
            boundary,
            sentinel: DayKey::sentinel(boundary),
            state: AggregationState::default(),
        }
    }

    /// replace the last reading, no filtering and no bucket changes
    pub fn record_latest(&mut self, raw: &RawReading) -> Result<()> {
        let reading = normalize(raw)?;
        self.state.last_reading = Some(reading);
        Ok(())
    }

    /// fold one historical reading into its day bucket and the global extrema
    ///
    /// readings on the epoch day are dropped without touching anything.
    /// malformed readings leave the state as it was.
    pub fn record_historical(&mut self, raw: &RawReading) -> Result<Recorded> {
        let reading = normalize(raw)?;
        let key = DayKey::of(reading.timestamp, self.boundary);

        if key == self.sentinel {
            tracing::debug!(epoch_time = raw.epoch_time, "dropping reading on the epoch day");
            return Ok(Recorded::Dropped);
        }

        let extrema = self.state.extrema.observe(reading.temperature, reading.humidity);
        let (bucket, outcome) = match self.state.buckets.remove(&key) {
            Some(existing) => (existing.with_reading(reading), Recorded::Appended(key.clone())),
            None => (DayBucket::seeded(reading), Recorded::NewDay(key.clone())),
        };

        if matches!(outcome, Recorded::NewDay(_)) {
            self.state.order.push(key.clone());
        }
        self.state.buckets.insert(key, bucket);
        self.state.extrema = extrema;

        Ok(outcome)
    }

    pub fn current_state(&self) -> &AggregationState {
        &self.state
    }

    pub fn boundary(&self) -> DayBoundary {
        self.boundary
    }
}

impl Default for AggregationStore {
    fn default() -> Self {
        Self::new(DayBoundary::default())
    }
}

// ==============================================================================
// shared handle
// ==============================================================================
// one lock guards the whole state: the aggregator task writes, http handlers read.

#[derive(Clone, Debug, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<AggregationStore>>,
}

impl SharedStore {
    pub fn new(store: AggregationStore) -> Self {
        Self { inner: Arc::new(RwLock::new(store)) }
    }

    pub async fn record_latest(&self, raw: &RawReading) -> Result<()> {
        self.inner.write().await.record_latest(raw)
    }

    pub async fn record_historical(&self, raw: &RawReading) -> Result<Recorded> {
        self.inner.write().await.record_historical(raw)
    }

    /// owned copy of the current state
    pub async fn snapshot(&self) -> AggregationState {
        self.inner.read().await.current_state().clone()
    }
}
