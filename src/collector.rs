//! Fans one fetch out per date and folds the results into a single collection.
//!
//! Fetch tasks never touch the collection. Each task sends its result over a
//! channel to the accumulator loop, which owns the records. The loop ends once
//! every task has dropped its sender, so the returned collection is complete.

use chrono::NaiveDate;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, warn};

use crate::core::{FetchError, RateFeed, Record};

#[derive(Debug)]
pub enum DayStatus {
    Loaded(usize),
    /// The feed answered but published no usable rates.
    Empty,
    Failed(FetchError),
}

#[derive(Debug)]
pub struct DayOutcome {
    pub date: NaiveDate,
    pub status: DayStatus,
}

#[derive(Debug, Default)]
pub struct Collection {
    /// In completion order, which is unspecified.
    pub records: Vec<Record>,
    /// One entry per finished fetch, sorted by date.
    pub days: Vec<DayOutcome>,
}

impl Collection {
    fn push(&mut self, date: NaiveDate, result: Result<Vec<Record>, FetchError>) {
        let status = match result {
            Ok(records) if records.is_empty() => {
                debug!(%date, "No rates published");
                DayStatus::Empty
            }
            Ok(records) => {
                debug!(%date, count = records.len(), "Collected rates");
                let count = records.len();
                self.records.extend(records);
                DayStatus::Loaded(count)
            }
            Err(e) => {
                warn!(%date, error = %e, "Fetch failed");
                DayStatus::Failed(e)
            }
        };
        self.days.push(DayOutcome { date, status });
    }

    /// Days that contributed no records, failed or empty.
    pub fn missing_days(&self) -> impl Iterator<Item = &DayOutcome> {
        self.days
            .iter()
            .filter(|day| !matches!(day.status, DayStatus::Loaded(_)))
    }
}

/// Fetches every date concurrently and waits for all of them.
///
/// `limit` caps the number of requests in flight; `None` starts them all at
/// once. `on_day` runs on the caller's task after each date completes.
pub async fn collect(
    feed: Arc<dyn RateFeed>,
    dates: Vec<NaiveDate>,
    limit: Option<usize>,
    on_day: &(dyn Fn() + Send + Sync),
) -> Collection {
    // More permits than dates are never used
    let permits = limit.unwrap_or(dates.len()).min(dates.len()).max(1);
    let permits = Arc::new(Semaphore::new(permits));
    let (tx, mut rx) = mpsc::channel(dates.len().max(1));

    debug!(days = dates.len(), ?limit, "Starting fetches");
    let handles: Vec<_> = dates
        .iter()
        .map(|&date| {
            let feed = Arc::clone(&feed);
            let permits = Arc::clone(&permits);
            let tx = tx.clone();
            tokio::spawn(async move {
                // The semaphore is never closed
                let _permit = permits.acquire_owned().await;
                let result = feed.fetch(date).await;
                // The receiver outlives every sender
                let _ = tx.send((date, result)).await;
            })
        })
        .collect();
    drop(tx);

    let mut collection = Collection::default();
    while let Some((date, result)) = rx.recv().await {
        collection.push(date, result);
        on_day();
    }

    // A task that died never sent its result; record the day as failed.
    for (date, joined) in dates.into_iter().zip(join_all(handles).await) {
        if let Err(e) = joined {
            collection.push(date, Err(FetchError::Aborted(e.to_string())));
            on_day();
        }
    }

    collection.days.sort_by_key(|day| day.date);
    debug!(
        records = collection.records.len(),
        days = collection.days.len(),
        "All fetches finished"
    );
    collection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::summarize;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn noop() {}

    /// Serves canned answers; dates without one fail with a 404.
    struct StubFeed {
        answers: HashMap<NaiveDate, Vec<(&'static str, f64)>>,
    }

    #[async_trait]
    impl RateFeed for StubFeed {
        async fn fetch(&self, date: NaiveDate) -> Result<Vec<Record>, FetchError> {
            match self.answers.get(&date) {
                Some(rates) => Ok(rates
                    .iter()
                    .map(|(code, rate)| Record::new(date, code, code, *rate))
                    .collect()),
                None => Err(FetchError::Status(404)),
            }
        }
    }

    /// Returns `per_day` records after a per-date delay, tracking concurrency.
    struct SlowFeed {
        per_day: usize,
        delays_ms: HashMap<NaiveDate, u64>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowFeed {
        fn new(per_day: usize, delays_ms: HashMap<NaiveDate, u64>) -> Self {
            SlowFeed {
                per_day,
                delays_ms,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RateFeed for SlowFeed {
        async fn fetch(&self, date: NaiveDate) -> Result<Vec<Record>, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays_ms.get(&date).copied().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok((0..self.per_day)
                .map(|i| Record::new(date, &format!("C{i}"), "Currency", 1.0 + i as f64))
                .collect())
        }
    }

    struct PanickyFeed;

    #[async_trait]
    impl RateFeed for PanickyFeed {
        async fn fetch(&self, date: NaiveDate) -> Result<Vec<Record>, FetchError> {
            if date == day(2) {
                panic!("feed exploded");
            }
            Ok(vec![Record::new(date, "USD", "US Dollar", 90.0)])
        }
    }

    #[tokio::test]
    async fn test_three_day_window_with_a_failed_day() {
        let feed = StubFeed {
            answers: HashMap::from([
                (day(1), vec![("USD", 90.0), ("EUR", 100.0)]),
                (day(3), vec![("USD", 95.0), ("EUR", 98.0)]),
            ]),
        };

        let collection =
            collect(Arc::new(feed), vec![day(1), day(2), day(3)], None, &noop).await;

        assert_eq!(collection.records.len(), 4);
        assert_eq!(collection.days.len(), 3);
        assert!(matches!(collection.days[0].status, DayStatus::Loaded(2)));
        assert!(matches!(
            collection.days[1].status,
            DayStatus::Failed(FetchError::Status(404))
        ));
        assert!(matches!(collection.days[2].status, DayStatus::Loaded(2)));

        let missing: Vec<_> = collection.missing_days().map(|d| d.date).collect();
        assert_eq!(missing, vec![day(2)]);

        let summary = summarize(&collection.records).unwrap();
        assert_eq!(summary.max.code, "EUR");
        assert_eq!(summary.max.rate, 100.0);
        assert_eq!(summary.max.date, day(1));
        assert_eq!(summary.min.code, "USD");
        assert_eq!(summary.min.rate, 90.0);
        assert_eq!(summary.min.date, day(1));
        assert!((summary.mean - 95.75).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_empty_day_is_distinct_from_failure() {
        let feed = StubFeed {
            answers: HashMap::from([(day(1), vec![])]),
        };

        let collection = collect(Arc::new(feed), vec![day(1), day(2)], None, &noop).await;

        assert!(collection.records.is_empty());
        assert!(matches!(collection.days[0].status, DayStatus::Empty));
        assert!(matches!(collection.days[1].status, DayStatus::Failed(_)));
        assert_eq!(collection.missing_days().count(), 2);
    }

    #[tokio::test]
    async fn test_no_dates() {
        let feed = StubFeed {
            answers: HashMap::new(),
        };
        let collection = collect(Arc::new(feed), vec![], None, &noop).await;
        assert!(collection.records.is_empty());
        assert!(collection.days.is_empty());
    }

    #[tokio::test]
    async fn test_progress_called_once_per_day() {
        let feed = StubFeed {
            answers: HashMap::from([(day(1), vec![("USD", 90.0)])]),
        };
        let calls = AtomicUsize::new(0);
        let on_day = || {
            calls.fetch_add(1, Ordering::SeqCst);
        };

        collect(Arc::new(feed), (1..=5).map(day).collect(), None, &on_day).await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_limit_bounds_requests_in_flight() {
        let dates: Vec<_> = (1..=20).map(day).collect();
        let delays = dates.iter().map(|d| (*d, 20)).collect();
        let feed = Arc::new(SlowFeed::new(1, delays));

        let collection = collect(feed.clone(), dates, Some(3), &noop).await;

        assert_eq!(collection.records.len(), 20);
        assert!(feed.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unbounded_runs_all_days_at_once() {
        let dates: Vec<_> = (1..=10).map(day).collect();
        let delays = dates.iter().map(|d| (*d, 100)).collect();
        let feed = Arc::new(SlowFeed::new(1, delays));

        collect(feed.clone(), dates, None, &noop).await;
        assert_eq!(feed.peak.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_panicked_task_is_reported_as_failed_day() {
        let collection =
            collect(Arc::new(PanickyFeed), vec![day(1), day(2), day(3)], None, &noop).await;

        assert_eq!(collection.records.len(), 2);
        let dates: Vec<_> = collection.days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
        assert!(matches!(
            collection.days[1].status,
            DayStatus::Failed(FetchError::Aborted(_))
        ));

        let missing: Vec<_> = collection.missing_days().map(|d| d.date).collect();
        assert_eq!(missing, vec![day(2)]);
    }

    #[tokio::test]
    async fn test_limit_above_semaphore_capacity() {
        let feed = StubFeed {
            answers: HashMap::from([(day(1), vec![("USD", 90.0)])]),
        };

        let collection = collect(Arc::new(feed), vec![day(1)], Some(usize::MAX), &noop).await;
        assert_eq!(collection.records.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_still_makes_progress() {
        let feed = StubFeed {
            answers: HashMap::from([(day(1), vec![("USD", 90.0)]), (day(2), vec![])]),
        };

        let collection = collect(Arc::new(feed), vec![day(1), day(2)], Some(0), &noop).await;
        assert_eq!(collection.days.len(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_no_lost_appends(
            delays in prop::collection::vec(0u64..5, 1..40),
            per_day in 0usize..8,
            limit in prop::option::of(1usize..16),
        ) {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap();

            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let dates: Vec<_> = (0..delays.len() as u64)
                .map(|i| start + chrono::Days::new(i))
                .collect();
            let delays_ms = dates.iter().copied().zip(delays.iter().copied()).collect();
            let feed = Arc::new(SlowFeed::new(per_day, delays_ms));

            let collection = rt.block_on(collect(feed, dates.clone(), limit, &noop));

            prop_assert_eq!(collection.records.len(), dates.len() * per_day);
            prop_assert_eq!(collection.days.len(), dates.len());
            let seen: Vec<_> = collection.days.iter().map(|d| d.date).collect();
            prop_assert_eq!(seen, dates);
        }
    }
}
