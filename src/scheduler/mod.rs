//! Periodic fetch scheduling
//!
//! This module drives the fetch cycle:
//! - One cycle right away, then one per configured interval
//! - Tracked characters processed sequentially with a pacing delay
//! - Failures isolated per character
//! - Cooperative stop through a handle or a cancellation token

mod pipeline;

pub use pipeline::{CharacterOutcome, PipelineError};

use crate::config::{Config, FetcherConfig};
use crate::poe::PoeClient;
use crate::publish::{BuildSite, HttpPublisher, Publisher};
use crate::renderer::{HeadlessRenderer, Renderer};
use crate::storage::{open_storage, SqliteStorage, Storage, TrackedCharacter};
use crate::{ConfigError, TrackerError};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Counters for one fetch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Characters dispatched to the pipeline
    pub processed: usize,
    /// New snapshots stored
    pub persisted: usize,
    /// Exports identical to the latest snapshot
    pub unchanged: usize,
    /// Rows not fetched: skip flag set or character dead
    pub skipped: usize,
    /// Pipelines that ended in an error
    pub failed: usize,
    /// The cycle ended early on a stop request
    pub interrupted: bool,
}

impl CycleReport {
    fn record(&mut self, outcome: &CharacterOutcome) {
        match outcome {
            CharacterOutcome::Persisted { .. } => self.persisted += 1,
            CharacterOutcome::NoChangeDetected => self.unchanged += 1,
            CharacterOutcome::SkippedDead => self.skipped += 1,
        }
    }
}

/// Stop sources observed while waiting
struct StopSignal {
    stop_rx: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl StopSignal {
    fn is_stopped(&self) -> bool {
        *self.stop_rx.borrow() || self.cancel.is_cancelled()
    }

    /// Sleeps for `duration`, returning false if a stop arrived first
    async fn sleep(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.stop_rx.changed() => false,
            _ = self.cancel.cancelled() => false,
        }
    }
}

/// Fetches, renders and stores builds of every tracked character
pub struct FetchScheduler<S, R, P> {
    storage: Arc<Mutex<S>>,
    client: PoeClient,
    renderer: R,
    publisher: Option<(P, BuildSite)>,
    realm: String,
    interval: Duration,
    pacing: Duration,
}

impl<S, R, P> FetchScheduler<S, R, P>
where
    S: Storage + Send + 'static,
    R: Renderer + 'static,
    P: Publisher + 'static,
{
    /// Creates a scheduler without a publisher
    ///
    /// # Arguments
    ///
    /// * `storage` - Shared storage backend
    /// * `client` - Character-window API client
    /// * `renderer` - Engine turning fetched documents into an export
    /// * `fetcher` - Interval, pacing and realm settings
    pub fn new(
        storage: Arc<Mutex<S>>,
        client: PoeClient,
        renderer: R,
        fetcher: &FetcherConfig,
    ) -> Self {
        Self {
            storage,
            client,
            renderer,
            publisher: None,
            realm: fetcher.realm.clone(),
            interval: fetcher.interval(),
            pacing: fetcher.pacing(),
        }
    }

    /// Publishes every new snapshot to `site`
    pub fn with_publisher(mut self, publisher: P, site: BuildSite) -> Self {
        self.publisher = Some((publisher, site));
        self
    }

    /// Shared handle to the storage backend
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }

    pub(crate) fn lock_storage(&self) -> MutexGuard<'_, S> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs a single fetch cycle over every tracked character
    pub async fn run_once(&self) -> CycleReport {
        self.run_cycle(None).await
    }

    /// Starts the periodic loop on a background task
    ///
    /// The first cycle runs immediately. The loop ends when
    /// [`SchedulerHandle::stop`] is called, when `cancel` is cancelled or
    /// when the handle is dropped.
    pub fn start(self, cancel: CancellationToken) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let signal = StopSignal { stop_rx, cancel };
        let task = tokio::spawn(self.run_loop(signal));
        SchedulerHandle { stop_tx, task }
    }

    async fn run_loop(self, mut signal: StopSignal) {
        tracing::info!(
            "Fetch scheduler started (interval: {}s, pacing: {}ms)",
            self.interval.as_secs(),
            self.pacing.as_millis()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = signal.stop_rx.changed() => break,
                _ = signal.cancel.cancelled() => break,
            }

            let report = self.run_cycle(Some(&mut signal)).await;
            if report.interrupted || signal.is_stopped() {
                break;
            }
        }

        tracing::info!("Fetch scheduler stopped");
    }

    async fn run_cycle(&self, mut signal: Option<&mut StopSignal>) -> CycleReport {
        let mut report = CycleReport::default();

        let tracked = {
            let storage = self.lock_storage();
            storage.list_tracked_characters()
        };
        let tracked = match tracked {
            Ok(tracked) => tracked,
            Err(e) => {
                tracing::error!("Failed to list tracked characters: {}", e);
                return report;
            }
        };

        let (skipped, due): (Vec<TrackedCharacter>, Vec<TrackedCharacter>) =
            tracked.into_iter().partition(|t| t.should_skip);
        report.skipped = skipped.len();
        tracing::info!(
            "Starting fetch cycle: {} characters due, {} skipped",
            due.len(),
            report.skipped
        );

        for tracked in &due {
            if signal.as_deref().is_some_and(StopSignal::is_stopped) {
                report.interrupted = true;
                break;
            }

            let span = tracing::info_span!(
                "fetcher",
                tracked = tracked.id,
                account = tracing::field::Empty,
                character = tracing::field::Empty,
            );

            report.processed += 1;
            match self.process_character(tracked).instrument(span.clone()).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    report.failed += 1;
                    span.in_scope(|| tracing::error!("Character fetch failed: {}", e));
                }
            }

            let keep_going = match signal.as_deref_mut() {
                Some(signal) => signal.sleep(self.pacing).await,
                None => {
                    tokio::time::sleep(self.pacing).await;
                    true
                }
            };
            if !keep_going {
                report.interrupted = true;
                break;
            }
        }

        tracing::info!(
            "Fetch cycle finished: {} processed, {} persisted, {} unchanged, {} skipped, {} failed",
            report.processed,
            report.persisted,
            report.unchanged,
            report.skipped,
            report.failed
        );
        report
    }
}

impl FetchScheduler<SqliteStorage, HeadlessRenderer, HttpPublisher> {
    /// Builds the production scheduler from configuration
    ///
    /// # Returns
    ///
    /// * `Ok(FetchScheduler)` - Storage opened, clients built, publisher attached when enabled
    /// * `Err(TrackerError)` - Database, HTTP client or site lookup failed
    pub fn from_config(config: &Config) -> Result<Self, TrackerError> {
        let storage = open_storage(Path::new(&config.storage.database_path))?;
        let client = PoeClient::new(&config.api, &config.user_agent)?;
        let renderer = HeadlessRenderer::new(config.renderer.clone());
        let scheduler = Self::new(
            Arc::new(Mutex::new(storage)),
            client,
            renderer,
            &config.fetcher,
        );

        if !config.publisher.enabled {
            tracing::info!("Publishing disabled");
            return Ok(scheduler);
        }

        let site = BuildSite::by_id(&config.publisher.site)
            .ok_or_else(|| ConfigError::UnknownSite(config.publisher.site.clone()))?;
        tracing::info!("Publishing new snapshots to {}", site.label);
        let publisher = HttpPublisher::new(&config.user_agent)?;
        Ok(scheduler.with_publisher(publisher, site))
    }

    /// Whether new snapshots are published
    pub fn publishes(&self) -> bool {
        self.publisher.is_some()
    }
}

/// Controls a running [`FetchScheduler`]
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Asks the loop to stop at its next wait
    ///
    /// A character already in the pipeline is finished first.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Waits for the loop to end
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }

    /// Stops the loop and waits for it to end
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        self.stop();
        self.join().await
    }
}
