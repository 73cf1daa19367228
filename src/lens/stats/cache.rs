//! Published statistics and their refresh schedule

use super::types::{FastStats, SlowStats, StatsSnapshot};
use super::StatsLens;
use crate::config::PeriscopeConfig;
use arc_swap::ArcSwap;
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// =============================================================================
// Cache
// =============================================================================

/// Latest completed statistics, one slot per refresh cadence
///
/// Each slot is swapped atomically as a whole, so a reader keeps a
/// consistent half for as long as it holds on to it and never waits on a
/// publisher. Until the first refresh of a cadence completes its slot holds
/// zeros and empty lists.
pub struct StatsCache {
    fast: ArcSwap<FastStats>,
    slow: ArcSwap<SlowStats>,
    created_at: i64,
}

impl Default for StatsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCache {
    pub fn new() -> Self {
        Self {
            fast: ArcSwap::from_pointee(FastStats::default()),
            slow: ArcSwap::from_pointee(SlowStats::default()),
            created_at: Utc::now().timestamp(),
        }
    }

    pub fn fast(&self) -> Arc<FastStats> {
        self.fast.load_full()
    }

    pub fn slow(&self) -> Arc<SlowStats> {
        self.slow.load_full()
    }

    pub fn publish_fast(&self, stats: FastStats) {
        self.fast.store(Arc::new(stats));
    }

    pub fn publish_slow(&self, stats: SlowStats) {
        self.slow.store(Arc::new(stats));
    }

    /// The current halves combined into the served document
    pub fn snapshot(&self) -> StatsSnapshot {
        let fast = self.fast.load();
        let slow = self.slow.load();
        StatsSnapshot::combine(&fast, &slow, self.created_at)
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Marks a refresh task as running; cleared on drop
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Run `job` every `period`, starting immediately
///
/// A tick is skipped while the previous run of the same job is still going.
/// Runs are detached from the ticking loop so a slow run never delays the
/// schedule, and are abandoned when `cancel` fires.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    job: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let in_flight = Arc::new(AtomicBool::new(false));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("{} refresh stopped", name);
                    break;
                }
                _ = ticker.tick() => {
                    let Some(guard) = InFlight::acquire(&in_flight) else {
                        warn!("{} refresh still running, skipping tick", name);
                        continue;
                    };

                    let run = job();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        let _guard = guard;
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            _ = run => {}
                        }
                    });
                }
            }
        }
    })
}

/// Keeps a [`StatsCache`] current with two independent refresh cadences
pub struct RefreshScheduler {
    lens: StatsLens,
    cache: Arc<StatsCache>,
    fast_period: Duration,
    slow_period: Duration,
    cancel: CancellationToken,
}

impl RefreshScheduler {
    pub fn new(
        lens: StatsLens,
        cache: Arc<StatsCache>,
        fast_period: Duration,
        slow_period: Duration,
    ) -> Self {
        Self {
            lens,
            cache,
            fast_period,
            slow_period,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(lens: StatsLens, cache: Arc<StatsCache>, config: &PeriscopeConfig) -> Self {
        Self::new(
            lens,
            cache,
            config.fast_refresh_interval(),
            config.slow_refresh_interval(),
        )
    }

    /// Start both refresh tasks; each runs once right away
    pub fn spawn(self) -> RefreshHandle {
        info!(
            "Starting statistics refresh (fast every {:?}, slow every {:?})",
            self.fast_period, self.slow_period
        );

        let fast = {
            let lens = self.lens.clone();
            let cache = self.cache.clone();
            spawn_periodic("fast", self.fast_period, self.cancel.clone(), move || {
                let lens = lens.clone();
                let cache = cache.clone();
                async move {
                    match lens.fast().await {
                        Ok(stats) => cache.publish_fast(stats),
                        Err(e) => warn!(
                            "Fast statistics refresh failed, keeping previous values: {}",
                            e
                        ),
                    }
                }
            })
        };

        let slow = {
            let lens = self.lens.clone();
            let cache = self.cache.clone();
            spawn_periodic("slow", self.slow_period, self.cancel.clone(), move || {
                let lens = lens.clone();
                let cache = cache.clone();
                async move {
                    match lens.slow().await {
                        Ok(stats) => cache.publish_slow(stats),
                        Err(e) => warn!(
                            "Slow statistics refresh failed, keeping previous values: {}",
                            e
                        ),
                    }
                }
            })
        };

        RefreshHandle {
            cancel: self.cancel,
            tasks: vec![fast, slow],
        }
    }
}

/// Handle on running refresh tasks
pub struct RefreshHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop ticking and wait for both loops to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Statistics refresh task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::routes::fixtures::route;
    use crate::lens::stats::fixtures::test_lens;
    use std::sync::atomic::AtomicUsize;

    fn counting_job(
        runs: Arc<AtomicUsize>,
        work: Duration,
    ) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> + Send + 'static {
        move || {
            let runs = runs.clone();
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(work).await;
            })
        }
    }

    #[test]
    fn test_cache_defaults_before_first_refresh() {
        let cache = StatsCache::new();
        assert_eq!(*cache.fast(), FastStats::default());
        assert_eq!(*cache.slow(), SlowStats::default());

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.peer_count, 0);
        assert!(snapshot.peers.is_empty());
    }

    #[test]
    fn test_readers_keep_their_half() {
        let cache = StatsCache::new();
        cache.publish_fast(FastStats {
            peer_count: 1,
            ipv4_table_size: 10,
            ..Default::default()
        });

        let held = cache.fast();
        cache.publish_fast(FastStats {
            peer_count: 2,
            ipv4_table_size: 20,
            ..Default::default()
        });

        assert_eq!((held.peer_count, held.ipv4_table_size), (1, 10));
        let current = cache.fast();
        assert_eq!((current.peer_count, current.ipv4_table_size), (2, 20));
        // The slow half is untouched by fast publications
        assert_eq!(*cache.slow(), SlowStats::default());
    }

    #[test]
    fn test_concurrent_readers_see_whole_publications() {
        let cache = Arc::new(StatsCache::new());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let fast = cache.fast();
                        // Every publication keeps the two fields in step
                        assert_eq!(fast.ipv4_table_size, fast.peer_count * 10);
                    }
                })
            })
            .collect();

        for i in 0..1_000u64 {
            cache.publish_fast(FastStats {
                peer_count: i,
                ipv4_table_size: i * 10,
                ..Default::default()
            });
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(cache.fast().peer_count, 999);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_runs_immediately_then_every_period() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let task = spawn_periodic(
            "test",
            Duration::from_secs(5),
            cancel.clone(),
            counting_job(runs.clone(), Duration::ZERO),
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_skips_tick_while_running() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let task = spawn_periodic(
            "test",
            Duration::from_secs(5),
            cancel.clone(),
            counting_job(runs.clone(), Duration::from_secs(12)),
        );

        // Ticks at 5s and 10s fall inside the first run (0s..12s)
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // The 15s tick finds the task idle again
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticking() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let task = spawn_periodic(
            "test",
            Duration::from_secs(5),
            cancel.clone(),
            counting_job(runs.clone(), Duration::ZERO),
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        cancel.cancel();
        task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scheduler_populates_cache() {
        let (_dir, lens) = test_lens(&[
            route("10.0.0.0/8", Some(100), Some(174)),
            route("2001:db8::/32", Some(100), Some(174)),
        ]);
        let cache = Arc::new(StatsCache::new());
        let handle = RefreshScheduler::new(
            lens,
            cache.clone(),
            Duration::from_secs(5),
            Duration::from_secs(90),
        )
        .spawn();

        let mut attempts = 0;
        while (cache.fast().computed_at.is_none() || cache.slow().computed_at.is_none())
            && attempts < 500
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
            attempts += 1;
        }

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.peer_count, 1);
        assert_eq!(snapshot.ipv4_table_size, 1);
        assert_eq!(snapshot.ipv6_table_size, 1);
        assert_eq!(snapshot.top_n_peers[0].asn, 174);
        assert_eq!(snapshot.top_n_peers[0].name.to_string(), "COGENT-174");

        handle.shutdown().await;
    }
}
