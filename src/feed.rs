//! ==============================================================================
//! feed.rs - the "latest" and "history" reading feeds
//! ==============================================================================
//!
//! purpose:
//!     moves raw records from the database into the aggregation store.
//!
//! ```text
//!     ┌──────────────┐   latest   ┌────────────┐
//!     │   poll loop  │ ─────────► │            │
//!     │ (ReadingSrc) │   history  │ aggregator │ ──► SharedStore
//!     │              │ ─────────► │   (task)   │
//!     └──────────────┘            └────────────┘
//! ```
//!
//! flow:
//!     - the poll loop asks a ReadingSource for the newest record and for the
//!       most recent window of records, and forwards only what it has not
//!       delivered before (child_added semantics, keyed by record key)
//!     - the aggregator is the single task that writes the store; it drains
//!       both channels and stops once both senders are gone
//!
//! relationships:
//!     - writes: aggregate.rs (SharedStore)
//!     - used by: main.rs (spawns poll loop + aggregator)
//!
//! ==============================================================================

use crate::aggregate::{Recorded, SharedStore};
use crate::domain::RawReading;

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

/// a raw record together with the database key it was stored under
#[derive(Clone, Debug, PartialEq)]
pub struct KeyedReading {
    pub key: String,
    pub raw: RawReading,
}

impl KeyedReading {
    pub fn new(key: impl Into<String>, raw: RawReading) -> Self {
        Self { key: key.into(), raw }
    }
}

// ==============================================================================
// sources
// ==============================================================================

/// somewhere raw records can be fetched from
pub trait ReadingSource: Send + Sync {
    /// the most recently pushed record (zero or one entries)
    fn fetch_latest(&self) -> impl Future<Output = Result<Vec<KeyedReading>>> + Send;

    /// the `window` records with the highest epoch_time
    fn fetch_history(&self, window: u32) -> impl Future<Output = Result<Vec<KeyedReading>>> + Send;
}

/// firebase realtime database, read through its REST api
#[derive(Clone, Debug)]
pub struct FirebaseSource {
    client: reqwest::Client,
    endpoint: String,
    auth: Option<String>,
}

impl FirebaseSource {
    pub fn new(url: &str, path: &str, auth: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/{}.json", url.trim_end_matches('/'), path.trim_matches('/')),
            auth,
        }
    }

    async fn query(&self, order_by: &str, limit: u32) -> Result<Vec<KeyedReading>> {
        let order_by = format!("\"{order_by}\"");
        let limit = limit.to_string();
        let mut params = vec![("orderBy", order_by.as_str()), ("limitToLast", limit.as_str())];
        if let Some(auth) = &self.auth {
            params.push(("auth", auth.as_str()));
        }

        let body: Value = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.endpoint))?
            .error_for_status()?
            .json()
            .await
            .context("response is not json")?;

        Ok(decode_records(body))
    }
}

impl ReadingSource for FirebaseSource {
    async fn fetch_latest(&self) -> Result<Vec<KeyedReading>> {
        self.query("$key", 1).await
    }

    async fn fetch_history(&self, window: u32) -> Result<Vec<KeyedReading>> {
        self.query("epoch_time", window).await
    }
}

/// decode a `{ key: record, ... }` object, skipping records that do not parse
///
/// `null` (an empty node) decodes to no records.
pub fn decode_records(body: Value) -> Vec<KeyedReading> {
    let Value::Object(map) = body else {
        if !body.is_null() {
            tracing::warn!("unexpected response shape, expected an object of records");
        }
        return Vec::new();
    };

    map.into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<RawReading>(value) {
            Ok(raw) => Some(KeyedReading { key, raw }),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "skipping undecodable record");
                None
            }
        })
        .collect()
}

// ==============================================================================
// poller - child_added bookkeeping
// ==============================================================================

/// remembers what was already delivered so each record is forwarded once
#[derive(Debug, Default)]
pub struct Poller {
    seen: HashSet<String>,
    latest_key: Option<String>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// records not delivered before, oldest first
    ///
    /// keys that left the window are forgotten; records never re-enter it.
    pub fn new_history(&mut self, mut window: Vec<KeyedReading>) -> Vec<KeyedReading> {
        window.sort_by(|a, b| {
            a.raw.epoch_time.total_cmp(&b.raw.epoch_time).then_with(|| a.key.cmp(&b.key))
        });

        let fresh: Vec<KeyedReading> = window
            .iter()
            .filter(|r| !self.seen.contains(&r.key))
            .cloned()
            .collect();

        self.seen = window.into_iter().map(|r| r.key).collect();
        fresh
    }

    /// the newest record, if its key changed since the last call
    pub fn new_latest(&mut self, records: Vec<KeyedReading>) -> Option<KeyedReading> {
        let newest = records.into_iter().max_by(|a, b| a.key.cmp(&b.key))?;
        if self.latest_key.as_deref() == Some(newest.key.as_str()) {
            return None;
        }
        self.latest_key = Some(newest.key.clone());
        Some(newest)
    }
}

// ==============================================================================
// channels
// ==============================================================================

/// sending halves of the two feeds
#[derive(Clone, Debug)]
pub struct FeedSenders {
    pub latest: mpsc::Sender<RawReading>,
    pub history: mpsc::Sender<RawReading>,
}

/// create both feeds and the aggregator that drains them into `store`
pub fn channels(store: SharedStore, capacity: usize, show_readings: bool) -> (FeedSenders, Aggregator) {
    let (latest_tx, latest_rx) = mpsc::channel(capacity);
    let (history_tx, history_rx) = mpsc::channel(capacity);

    let senders = FeedSenders { latest: latest_tx, history: history_tx };
    let aggregator = Aggregator {
        store,
        latest: latest_rx,
        history: history_rx,
        show_readings,
    };
    (senders, aggregator)
}

/// counts of what the aggregator did, returned when it stops
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub latest: usize,
    pub new_days: usize,
    pub appended: usize,
    pub dropped: usize,
    pub malformed: usize,
}

/// the single writer of the store
pub struct Aggregator {
    store: SharedStore,
    latest: mpsc::Receiver<RawReading>,
    history: mpsc::Receiver<RawReading>,
    show_readings: bool,
}

impl Aggregator {
    pub async fn run(mut self) -> AggregatorStats {
        let mut stats = AggregatorStats::default();
        let mut latest_open = true;
        let mut history_open = true;

        while latest_open || history_open {
            tokio::select! {
                msg = self.latest.recv(), if latest_open => match msg {
                    Some(raw) => self.apply_latest(&raw, &mut stats).await,
                    None => latest_open = false,
                },
                msg = self.history.recv(), if history_open => match msg {
                    Some(raw) => self.apply_history(&raw, &mut stats).await,
                    None => history_open = false,
                },
            }
        }

        tracing::info!(?stats, "aggregator stopped");
        stats
    }

    async fn apply_latest(&self, raw: &RawReading, stats: &mut AggregatorStats) {
        match self.store.record_latest(raw).await {
            Ok(()) => {
                stats.latest += 1;
                if self.show_readings {
                    tracing::info!(
                        temperature = raw.temperature,
                        humidity = raw.humidity,
                        voltage = raw.voltage,
                        "latest reading"
                    );
                }
            }
            Err(e) => {
                stats.malformed += 1;
                tracing::warn!(error = %e, "latest reading rejected");
            }
        }
    }

    async fn apply_history(&self, raw: &RawReading, stats: &mut AggregatorStats) {
        match self.store.record_historical(raw).await {
            Ok(Recorded::NewDay(day)) => {
                stats.new_days += 1;
                tracing::info!(day = %day, "new day bucket");
            }
            Ok(Recorded::Appended(day)) => {
                stats.appended += 1;
                if self.show_readings {
                    tracing::info!(day = %day, temperature = raw.temperature, humidity = raw.humidity, "reading");
                } else {
                    tracing::debug!(day = %day, "reading appended");
                }
            }
            Ok(Recorded::Dropped) => stats.dropped += 1,
            Err(e) => {
                stats.malformed += 1;
                tracing::warn!(error = %e, "historical reading rejected");
            }
        }
    }
}

// ==============================================================================
// poll loop
// ==============================================================================

/// one poll of both feeds, returns how many records were forwarded
pub async fn poll_once<S: ReadingSource>(
    source: &S,
    poller: &mut Poller,
    window: u32,
    senders: &FeedSenders,
) -> Result<usize> {
    let mut forwarded = 0;

    if let Some(latest) = poller.new_latest(source.fetch_latest().await?) {
        senders.latest.send(latest.raw).await.context("latest feed closed")?;
        forwarded += 1;
    }

    for record in poller.new_history(source.fetch_history(window).await?) {
        senders.history.send(record.raw).await.context("history feed closed")?;
        forwarded += 1;
    }

    Ok(forwarded)
}

/// poll forever, until the aggregator goes away
pub async fn run_poller<S: ReadingSource>(source: S, window: u32, interval: Duration, senders: FeedSenders) {
    let mut poller = Poller::new();

    loop {
        match poll_once(&source, &mut poller, window, &senders).await {
            Ok(0) => tracing::debug!("no new records"),
            Ok(n) => tracing::info!(records = n, "forwarded new records"),
            Err(e) if senders.history.is_closed() || senders.latest.is_closed() => {
                tracing::info!(error = %e, "feeds closed, stopping poller");
                return;
            }
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "poll failed"),
        }

        tokio::time::sleep(interval).await;
    }
}
