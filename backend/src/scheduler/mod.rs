//! Background jobs: occupancy ingestion, request cycle closing and periodic flushing.
//!
//! ```text
//!  ┌──────────────┐  every ingestion interval   ┌──────────────────────────┐
//!  │ ingestion    │ ──────────────────────────► │ Ingestor::ingest         │
//!  ├──────────────┤  at each request boundary   ├──────────────────────────┤
//!  │ request cycle│ ──────────────────────────► │ recalculate_cycle(now)   │
//!  ├──────────────┤  every flush interval       ├──────────────────────────┤
//!  │ flush        │ ──────────────────────────► │ StoreSet::flush_dirty    │
//!  └──────────────┘                             └──────────────────────────┘
//!          ▲
//!          └── watch channel: shutdown stops all three, then every store is flushed
//! ```
//!
//! Each job runs in its own task so a slow source never delays a cycle close.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime, Timelike};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::AppConfig;
use crate::db::{RepositoryError, StoreSet};
use crate::models::{minute_of_day, BucketLength, MINUTES_PER_DAY};
use crate::services::{Ingestor, OccupancySource};

/// Lower bound on every period; tokio rejects a zero interval.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Delay after a bucket boundary before closing the bucket, so the clock is
/// safely inside the next bucket.
const BOUNDARY_GRACE: Duration = Duration::from_secs(1);

/// Job periods.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    pub ingestion_interval: Duration,
    pub flush_interval: Duration,
    /// Request bucket length; cycles close at its boundaries.
    pub request_bucket_length: BucketLength,
}

impl SchedulerSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, RepositoryError> {
        Ok(Self {
            ingestion_interval: config.ingestion_interval(),
            flush_interval: config.flush_interval(),
            request_bucket_length: config.request_bucket_length()?,
        })
    }
}

/// Time from `now` until the next multiple of `length` past midnight.
pub fn until_next_boundary(now: NaiveTime, length: BucketLength) -> Duration {
    let len = length.minutes();
    let minute = minute_of_day(now);
    let next = ((minute / len + 1) * len).min(MINUTES_PER_DAY);
    let elapsed_secs = u64::from(minute) * 60 + u64::from(now.second());
    Duration::from_secs(u64::from(next) * 60 - elapsed_secs)
}

/// Owns the background tasks.
pub struct Scheduler {
    stores: StoreSet,
    ingestor: Ingestor,
    source: Option<Arc<dyn OccupancySource>>,
    settings: SchedulerSettings,
}

impl Scheduler {
    /// Without a `source` the ingestion job is not started.
    pub fn new(
        stores: StoreSet,
        source: Option<Arc<dyn OccupancySource>>,
        settings: SchedulerSettings,
    ) -> Self {
        let ingestor = Ingestor::from_stores(&stores);
        Self {
            stores,
            ingestor,
            source,
            settings,
        }
    }

    /// Spawn every job on the current runtime.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        if let Some(source) = self.source.clone() {
            tasks.push(tokio::spawn(ingestion_job(
                self.ingestor.clone(),
                source,
                self.settings.ingestion_interval,
                shutdown_rx.clone(),
            )));
        } else {
            log::warn!("No occupancy source configured, ingestion disabled");
        }

        tasks.push(tokio::spawn(request_cycle_job(
            self.stores.clone(),
            self.settings.request_bucket_length,
            shutdown_rx.clone(),
        )));
        tasks.push(tokio::spawn(flush_job(
            self.stores.clone(),
            self.settings.flush_interval,
            shutdown_rx,
        )));

        log::info!(
            "Scheduler started: ingestion every {:?}, request cycle every {}, flush every {:?}",
            self.settings.ingestion_interval,
            self.settings.request_bucket_length,
            self.settings.flush_interval
        );

        SchedulerHandle {
            shutdown: shutdown_tx,
            tasks,
            stores: self.stores,
        }
    }
}

/// Running jobs. Dropping the handle stops them without the final flush.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    stores: StoreSet,
}

impl SchedulerHandle {
    /// Stop every job, wait for it, then flush every store.
    ///
    /// # Returns
    /// The stores that failed their final flush.
    pub async fn shutdown(self) -> Vec<(String, RepositoryError)> {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                log::error!("Scheduler task ended abnormally: {}", e);
            }
        }

        let stores = self.stores;
        match tokio::task::spawn_blocking(move || stores.flush_all()).await {
            Ok(failures) => {
                log::info!("Scheduler stopped, final flush done");
                failures
            }
            Err(e) => {
                log::error!("Final flush task failed: {}", e);
                vec![(
                    "all".to_string(),
                    RepositoryError::persistence(format!("final flush task failed: {}", e)),
                )]
            }
        }
    }
}

async fn ingestion_job(
    ingestor: Ingestor,
    source: Arc<dyn OccupancySource>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = interval_at(Instant::now(), period.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                if let Err(e) = ingestor.ingest(source.as_ref()).await {
                    log::error!("Occupancy ingestion failed: {:#}", e);
                }
            }
        }
    }
    log::debug!("Ingestion job stopped");
}

/// Sleeps to each boundary afresh, so a short last bucket of the day and wall
/// clock adjustments are both honoured.
async fn request_cycle_job(
    stores: StoreSet,
    length: BucketLength,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let wait = until_next_boundary(Local::now().time(), length) + BOUNDARY_GRACE;
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(wait) => {
                stores.requests.recalculate_cycle(Local::now().time());
            }
        }
    }
    log::debug!("Request cycle job stopped");
}

async fn flush_job(stores: StoreSet, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let period = period.max(MIN_PERIOD);
    // The first tick is one period out: nothing is dirty right after restore.
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                let stores = stores.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || stores.flush_dirty()).await {
                    log::error!("Flush task failed: {}", e);
                }
            }
        }
    }
    log::debug!("Flush job stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RepositoryFactory;
    use crate::models::ParkingSnapshot;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FixedSource;

    #[async_trait]
    impl OccupancySource for FixedSource {
        async fn fetch(&self) -> anyhow::Result<Vec<ParkingSnapshot>> {
            Ok(vec![ParkingSnapshot {
                parking_id: 1,
                total_spots: 10,
                free_spots: 4,
            }])
        }
    }

    struct FailingSource;

    #[async_trait]
    impl OccupancySource for FailingSource {
        async fn fetch(&self) -> anyhow::Result<Vec<ParkingSnapshot>> {
            anyhow::bail!("feed unavailable")
        }
    }

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn settings(millis: u64) -> SchedulerSettings {
        SchedulerSettings {
            ingestion_interval: Duration::from_millis(millis),
            flush_interval: Duration::from_millis(millis),
            request_bucket_length: BucketLength::new(60).unwrap(),
        }
    }

    #[test]
    fn test_until_next_boundary() {
        let hour = BucketLength::new(60).unwrap();
        assert_eq!(until_next_boundary(t(9, 0, 0), hour), Duration::from_secs(3600));
        assert_eq!(until_next_boundary(t(9, 59, 30), hour), Duration::from_secs(30));
        assert_eq!(until_next_boundary(t(23, 30, 0), hour), Duration::from_secs(1800));

        let odd = BucketLength::new(7).unwrap();
        // Last bucket of the day is cut short at midnight.
        assert_eq!(until_next_boundary(t(23, 58, 0), odd), Duration::from_secs(120));
    }

    #[test]
    fn test_settings_from_config() {
        let config = AppConfig::default();
        let settings = SchedulerSettings::from_config(&config).unwrap();
        assert_eq!(settings.ingestion_interval, Duration::from_secs(900));
        assert_eq!(settings.flush_interval, Duration::from_secs(300));
        assert_eq!(settings.request_bucket_length.minutes(), 60);
    }

    #[tokio::test]
    async fn test_ingests_then_flushes_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let length = BucketLength::new(15).unwrap();
        let stores = RepositoryFactory::create_in_dir(dir.path(), length, length);

        let handle = Scheduler::new(stores.clone(), Some(Arc::new(FixedSource)), settings(10_000))
            .start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let failures = handle.shutdown().await;

        assert!(failures.is_empty());
        assert_eq!(stores.occupancy.len(), 1);
        assert!(dir.path().join("occupancy.json").exists());
        assert!(dir.path().join("historic.json").exists());
        assert!(dir.path().join("request_stats.json").exists());
    }

    #[tokio::test]
    async fn test_periodic_flush_writes_dirty_stores() {
        let dir = TempDir::new().unwrap();
        let length = BucketLength::new(15).unwrap();
        let stores = RepositoryFactory::create_in_dir(dir.path(), length, length);

        let handle = Scheduler::new(stores.clone(), None, settings(20)).start();
        stores
            .requests
            .register_request("/health", true, Local::now().time());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(!stores.requests.is_dirty());
        assert!(dir.path().join("request_stats.json").exists());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_source_failure_keeps_running() {
        let dir = TempDir::new().unwrap();
        let length = BucketLength::new(15).unwrap();
        let stores = RepositoryFactory::create_in_dir(dir.path(), length, length);

        let handle =
            Scheduler::new(stores.clone(), Some(Arc::new(FailingSource)), settings(10)).start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.shutdown().await.is_empty());
        assert!(stores.occupancy.is_empty());
    }
}
