//! Periodic callback scheduling with early wake.
//!
//! A registered callback runs on a fixed period from a single spawned task, so
//! invocations never overlap. Any holder of a [`WakeHandle`] can pull the next
//! invocation forward; wakes that arrive while the callback is running
//! coalesce into one extra invocation, and the period restarts after every
//! early run.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Work run by the scheduler.
#[async_trait::async_trait]
pub trait PeriodicCallback: Send + 'static {
    /// One invocation. Must bound its own waits.
    async fn on_tick(&mut self);
}

/// Requests an immediate invocation of a periodic callback.
#[derive(Debug, Clone, Default)]
pub struct WakeHandle {
    notify: Arc<Notify>,
}

impl WakeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the callback to run as soon as it is not already running.
    pub fn wake_now(&self) {
        self.notify.notify_one();
    }

    pub(crate) async fn woken(&self) {
        self.notify.notified().await
    }
}

/// Handle to a registered periodic callback.
pub struct PeriodicHandle<C> {
    wake: WakeHandle,
    cancel: CancellationToken,
    task: JoinHandle<C>,
}

impl<C> PeriodicHandle<C> {
    /// A handle other tasks can use to wake the callback early.
    pub fn waker(&self) -> WakeHandle {
        self.wake.clone()
    }

    /// Whether the scheduler task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop scheduling and return the callback once any in-flight invocation completes.
    ///
    /// Returns `None` if the callback panicked.
    pub async fn stop(self) -> Option<C> {
        self.cancel.cancel();
        match self.task.await {
            Ok(callback) => Some(callback),
            Err(e) => {
                error!("Periodic task failed: {}", e);
                None
            }
        }
    }
}

/// Spawns periodic callbacks.
pub struct Scheduler;

impl Scheduler {
    /// Run `callback` every `period` until `cancel` fires.
    ///
    /// The first invocation happens immediately. A missed tick is delayed
    /// rather than replayed in a burst.
    pub fn register_periodic<C>(
        period: Duration,
        callback: C,
        cancel: CancellationToken,
    ) -> PeriodicHandle<C>
    where
        C: PeriodicCallback,
    {
        let wake = WakeHandle::new();
        let task_wake = wake.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            Self::periodic_task(period, callback, task_wake, task_cancel).await
        });

        PeriodicHandle { wake, cancel, task }
    }

    async fn periodic_task<C>(
        period: Duration,
        mut callback: C,
        wake: WakeHandle,
        cancel: CancellationToken,
    ) -> C
    where
        C: PeriodicCallback,
    {
        info!("Periodic task started ({:?} period)", period);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks = 0u64;
        let mut early = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Periodic task cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    ticks += 1;
                }
                _ = wake.woken() => {
                    early += 1;
                    ticker.reset();
                    trace!("Early wake");
                }
            }

            callback.on_tick().await;
        }

        info!("Periodic task ended ({} ticks, {} early wakes)", ticks, early);
        callback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        calls: Arc<AtomicUsize>,
        running: Arc<AtomicUsize>,
        max_running: Arc<AtomicUsize>,
        work: Duration,
    }

    impl Counter {
        fn new(work: Duration) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                running: Arc::new(AtomicUsize::new(0)),
                max_running: Arc::new(AtomicUsize::new(0)),
                work,
            }
        }
    }

    #[async_trait::async_trait]
    impl PeriodicCallback for Counter {
        async fn on_tick(&mut self) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            if !self.work.is_zero() {
                tokio::time::sleep(self.work).await;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_on_period() {
        let counter = Counter::new(Duration::ZERO);
        let calls = Arc::clone(&counter.calls);
        let handle =
            Scheduler::register_periodic(Duration::from_millis(20), counter, CancellationToken::new());

        tokio::time::sleep(Duration::from_millis(110)).await;
        let n = calls.load(Ordering::SeqCst);
        // immediate first tick plus one per 20 ms
        assert!((5..=7).contains(&n), "{} invocations", n);

        let counter = handle.stop().await.expect("callback returned");
        assert_eq!(counter.calls.load(Ordering::SeqCst), n);
    }

    #[tokio::test(start_paused = true)]
    async fn wake_now_runs_before_the_next_tick() {
        let counter = Counter::new(Duration::ZERO);
        let calls = Arc::clone(&counter.calls);
        let handle =
            Scheduler::register_periodic(Duration::from_secs(3600), counter, CancellationToken::new());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        handle.waker().wake_now();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn invocations_never_overlap() {
        let counter = Counter::new(Duration::from_millis(15));
        let max_running = Arc::clone(&counter.max_running);
        let handle =
            Scheduler::register_periodic(Duration::from_millis(10), counter, CancellationToken::new());
        let waker = handle.waker();

        for _ in 0..20 {
            waker.wake_now();
            tokio::time::sleep(Duration::from_millis(3)).await;
        }

        handle.stop().await;
        assert_eq!(max_running.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_stops_the_task() {
        let parent = CancellationToken::new();
        let handle = Scheduler::register_periodic(
            Duration::from_millis(5),
            Counter::new(Duration::ZERO),
            parent.child_token(),
        );

        parent.cancel();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(handle.is_finished());
    }
}
