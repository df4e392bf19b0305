use greenhouse_host::feed::{self, AggregatorStats, KeyedReading, Poller, ReadingSource};
use greenhouse_host::view;
use greenhouse_host::{AggregationStore, DayBoundary, RawReading, SharedStore};

use std::sync::Mutex;

const NOV_14: f64 = 1_700_000_000.0;

fn raw(epoch_time: f64, humidity: f64, temperature: f64) -> RawReading {
    RawReading::new(epoch_time, humidity, temperature, 3700.0)
}

/// serves whatever window the test put in place
#[derive(Default)]
struct FakeSource {
    records: Mutex<Vec<KeyedReading>>,
}

impl FakeSource {
    fn push(&self, key: &str, raw: RawReading) {
        self.records.lock().unwrap().push(KeyedReading::new(key, raw));
    }
}

impl ReadingSource for FakeSource {
    async fn fetch_latest(&self) -> anyhow::Result<Vec<KeyedReading>> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().max_by(|a, b| a.key.cmp(&b.key)).cloned().into_iter().collect())
    }

    async fn fetch_history(&self, window: u32) -> anyhow::Result<Vec<KeyedReading>> {
        let mut records = self.records.lock().unwrap().clone();
        records.sort_by(|a, b| a.raw.epoch_time.total_cmp(&b.raw.epoch_time));
        let skip = records.len().saturating_sub(window as usize);
        Ok(records.into_iter().skip(skip).collect())
    }
}

#[tokio::test]
async fn aggregator_drains_both_channels_until_closed() -> anyhow::Result<()> {
    // Arrange
    let store = SharedStore::new(AggregationStore::new(DayBoundary::Utc));
    let (senders, aggregator) = feed::channels(store.clone(), 16, false);
    let task = tokio::spawn(aggregator.run());

    // Act
    senders.history.send(raw(NOV_14, 55.4, 21.6)).await?;
    senders.history.send(raw(NOV_14 + 600.0, 60.9, 18.2)).await?;
    senders.history.send(raw(0.0, 10.0, 10.0)).await?;
    senders.history.send(raw(NOV_14, f64::NAN, 10.0)).await?;
    senders.latest.send(raw(NOV_14 + 600.0, 60.9, 18.2)).await?;
    drop(senders);
    let stats = task.await?;

    // Assert
    assert_eq!(
        stats,
        AggregatorStats { latest: 1, new_days: 1, appended: 1, dropped: 1, malformed: 1 }
    );
    let state = store.snapshot().await;
    assert_eq!(state.bucket_count(), 1);
    assert_eq!(state.reading_count(), 2);
    assert_eq!(state.last_reading.as_ref().map(|r| r.temperature), Some(18));
    Ok(())
}

#[tokio::test]
async fn polling_forwards_each_record_once() -> anyhow::Result<()> {
    // Arrange
    let source = FakeSource::default();
    source.push("-N01", raw(NOV_14, 50.0, 20.0));
    source.push("-N02", raw(NOV_14 + 600.0, 52.0, 21.0));
    let store = SharedStore::new(AggregationStore::new(DayBoundary::Utc));
    let (senders, aggregator) = feed::channels(store.clone(), 16, false);
    let task = tokio::spawn(aggregator.run());
    let mut poller = Poller::new();

    // Act
    let first = feed::poll_once(&source, &mut poller, 300, &senders).await?;
    let second = feed::poll_once(&source, &mut poller, 300, &senders).await?;
    source.push("-N03", raw(NOV_14 + 1200.0, 58.0, 24.0));
    let third = feed::poll_once(&source, &mut poller, 300, &senders).await?;
    drop(senders);
    let stats = task.await?;

    // Assert
    assert_eq!((first, second, third), (3, 0, 2));
    assert_eq!(stats.latest, 2);
    let state = store.snapshot().await;
    assert_eq!(state.reading_count(), 3);
    assert_eq!(state.last_reading.as_ref().map(|r| r.humidity), Some(58));
    Ok(())
}

#[tokio::test]
async fn history_window_limits_the_backlog() -> anyhow::Result<()> {
    // Arrange
    let source = FakeSource::default();
    for i in 0..10 {
        source.push(&format!("-N{i:02}"), raw(NOV_14 + f64::from(i) * 60.0, 50.0, 20.0));
    }
    let store = SharedStore::new(AggregationStore::new(DayBoundary::Utc));
    let (senders, aggregator) = feed::channels(store.clone(), 16, false);
    let task = tokio::spawn(aggregator.run());

    // Act
    feed::poll_once(&source, &mut Poller::new(), 4, &senders).await?;
    drop(senders);
    task.await?;

    // Assert
    assert_eq!(store.snapshot().await.reading_count(), 4);
    Ok(())
}

#[tokio::test]
async fn history_view_lists_most_recent_day_first() -> anyhow::Result<()> {
    // Arrange
    let store = SharedStore::new(AggregationStore::new(DayBoundary::Utc));
    let day = 86_400.0;
    store.record_historical(&raw(NOV_14 - day, 40.0, 10.0)).await?;
    store.record_historical(&raw(NOV_14, 60.0, 25.0)).await?;
    store.record_historical(&raw(NOV_14 + 60.0, 65.0, 23.0)).await?;

    // Act
    let state = store.snapshot().await;
    let temperature = view::temperature_history(&state);
    let humidity = view::humidity_history(&state);

    // Assert
    let days: Vec<String> = temperature.iter().map(|e| e.day.to_string()).collect();
    assert_eq!(days, ["2023-11-14", "2023-11-13"]);
    assert_eq!((temperature[0].min, temperature[0].max), (23, 25));
    assert_eq!((temperature[0].total_min, temperature[0].total_max), (10, 25));
    assert_eq!(temperature[0].points.iter().map(|p| p.y).collect::<Vec<_>>(), [25, 23]);
    assert_eq!(temperature[0].date.timestamp(), NOV_14 as i64);
    assert_eq!((humidity[1].min, humidity[1].max), (40, 40));
    assert_eq!((humidity[1].total_min, humidity[1].total_max), (40, 65));
    Ok(())
}
