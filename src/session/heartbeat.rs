use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::activity::{ActivityProbe, PlayerActivity};
use crate::error::TransportError;
use crate::transport::KeepaliveTransport;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatState {
    Idle,
    Running,
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    Skipped(PlayerActivity),
    Sent,
    Failed(TransportError),
}

/// Drives the periodic keepalive while a session is connected.
///
/// The ticker lives in its own task so a slow upstream never holds up the
/// dispatcher. `stop` waits for that task to be gone before returning.
pub struct HeartbeatScheduler {
    interval: Duration,
    transport: Arc<dyn KeepaliveTransport>,
    activity: Arc<dyn ActivityProbe>,
    ticker: Option<JoinHandle<()>>,
}

impl HeartbeatScheduler {
    pub fn new(
        interval: Duration,
        transport: Arc<dyn KeepaliveTransport>,
        activity: Arc<dyn ActivityProbe>,
    ) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!(?interval, "heartbeat interval too small, using {MIN_INTERVAL:?}");
        }
        Self {
            interval: interval.max(MIN_INTERVAL),
            transport,
            activity,
            ticker: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// A ticker task that has exited on its own counts as idle.
    pub fn state(&self) -> HeartbeatState {
        if self.ticker.as_ref().is_some_and(|h| !h.is_finished()) {
            HeartbeatState::Running
        } else {
            HeartbeatState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == HeartbeatState::Running
    }

    /// Idle -> Running. No-op when already running. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        if let Some(dead) = self.ticker.take() {
            tracing::warn!("heartbeat ticker exited unexpectedly, restarting");
            drop(dead);
        }

        let interval = self.interval;
        let transport = Arc::clone(&self.transport);
        let activity = Arc::clone(&self.activity);
        self.ticker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // A panicking transport takes down only this call, not the ticker.
                let mut call = AbortOnDrop(tokio::spawn({
                    let transport = Arc::clone(&transport);
                    let activity = Arc::clone(&activity);
                    async move {
                        tick(transport.as_ref(), activity.as_ref(), interval).await;
                    }
                }));
                if let Err(e) = (&mut call.0).await {
                    if e.is_panic() {
                        tracing::error!("keepalive call panicked: {e}");
                    }
                }
            }
        }));
        tracing::info!(?interval, "heartbeat started");
    }

    /// Running -> Idle. An in-flight keepalive is cancelled; once this
    /// returns no further keepalive is issued.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!("heartbeat ticker failed: {e}");
                }
            }
            tracing::info!("heartbeat stopped");
        }
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

/// Cancels the wrapped task when the owner goes away, so stopping the ticker
/// also cancels a keepalive it is waiting on.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// One heartbeat tick: skip unless the player is active, otherwise send a
/// keepalive bounded by `timeout`. Failures are logged and swallowed.
pub async fn tick(
    transport: &dyn KeepaliveTransport,
    activity: &dyn ActivityProbe,
    timeout: Duration,
) -> TickOutcome {
    let current = activity.current_activity();
    if !current.wants_keepalive() {
        tracing::debug!(activity = ?current, "skipping heartbeat tick");
        return TickOutcome::Skipped(current);
    }

    let result = match tokio::time::timeout(timeout, transport.send_keepalive()).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(timeout)),
    };

    match result {
        Ok(()) => {
            tracing::trace!("keepalive sent");
            TickOutcome::Sent
        }
        Err(e) => {
            tracing::warn!("keepalive failed: {e}");
            TickOutcome::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::SharedActivity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const INTERVAL: Duration = Duration::from_secs(30);

    #[derive(Default)]
    struct CountingTransport {
        started: AtomicUsize,
        completed: AtomicUsize,
        fail: bool,
        panic_first: bool,
        delay: Option<Duration>,
    }

    impl CountingTransport {
        fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }

        fn completed(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeepaliveTransport for CountingTransport {
        async fn send_keepalive(&self) -> Result<(), TransportError> {
            let call = self.started.fetch_add(1, Ordering::SeqCst);
            if self.panic_first && call == 0 {
                panic!("transport blew up");
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TransportError::Closed)
            } else {
                Ok(())
            }
        }
    }

    fn scheduler(
        transport: &Arc<CountingTransport>,
        activity: &SharedActivity,
    ) -> HeartbeatScheduler {
        HeartbeatScheduler::new(
            INTERVAL,
            transport.clone(),
            Arc::new(activity.clone()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_skips_when_not_loaded() {
        let transport = CountingTransport::default();
        let activity = SharedActivity::new(PlayerActivity::NotLoaded);
        let outcome = tick(&transport, &activity, INTERVAL).await;
        assert!(matches!(outcome, TickOutcome::Skipped(PlayerActivity::NotLoaded)));
        assert_eq!(transport.started(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_skips_when_ended() {
        let transport = CountingTransport::default();
        let activity = SharedActivity::new(PlayerActivity::Ended);
        let outcome = tick(&transport, &activity, INTERVAL).await;
        assert!(matches!(outcome, TickOutcome::Skipped(PlayerActivity::Ended)));
        assert_eq!(transport.started(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_sends_exactly_once_when_active() {
        let transport = CountingTransport::default();
        let activity = SharedActivity::new(PlayerActivity::Active);
        let outcome = tick(&transport, &activity, INTERVAL).await;
        assert!(matches!(outcome, TickOutcome::Sent));
        assert_eq!(transport.started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_times_out_slow_keepalive() {
        let transport = CountingTransport {
            delay: Some(Duration::from_secs(120)),
            ..Default::default()
        };
        let activity = SharedActivity::new(PlayerActivity::Active);
        let outcome = tick(&transport, &activity, INTERVAL).await;
        assert!(matches!(outcome, TickOutcome::Failed(TransportError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_interval() {
        let transport = Arc::new(CountingTransport::default());
        let activity = SharedActivity::new(PlayerActivity::Active);
        let mut heartbeat = scheduler(&transport, &activity);

        heartbeat.start();
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(transport.started(), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.started(), 1);
        heartbeat.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let transport = Arc::new(CountingTransport::default());
        let activity = SharedActivity::new(PlayerActivity::Active);
        let mut heartbeat = scheduler(&transport, &activity);

        heartbeat.start();
        heartbeat.start();
        assert_eq!(heartbeat.state(), HeartbeatState::Running);

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(transport.started(), 3);
        heartbeat.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_player_keeps_scheduler_running() {
        let transport = Arc::new(CountingTransport::default());
        let activity = SharedActivity::new(PlayerActivity::NotLoaded);
        let mut heartbeat = scheduler(&transport, &activity);

        heartbeat.start();
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(transport.started(), 0);
        assert!(heartbeat.is_running());

        activity.set(PlayerActivity::Active);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.started(), 1);
        heartbeat.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_ticking() {
        let transport = Arc::new(CountingTransport {
            fail: true,
            ..Default::default()
        });
        let activity = SharedActivity::new(PlayerActivity::Active);
        let mut heartbeat = scheduler(&transport, &activity);

        heartbeat.start();
        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(transport.started(), 4);
        assert!(heartbeat.is_running());
        heartbeat.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_keepalive_does_not_kill_ticker() {
        let transport = Arc::new(CountingTransport {
            panic_first: true,
            ..Default::default()
        });
        let activity = SharedActivity::new(PlayerActivity::Active);
        let mut heartbeat = scheduler(&transport, &activity);

        heartbeat.start();
        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(heartbeat.state(), HeartbeatState::Running);
        assert!(transport.started() >= 4, "calls = {}", transport.started());
        heartbeat.stop().await;
        assert_eq!(heartbeat.state(), HeartbeatState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let transport = Arc::new(CountingTransport::default());
        let heartbeat = HeartbeatScheduler::new(
            Duration::ZERO,
            transport,
            Arc::new(SharedActivity::default()),
        );
        assert_eq!(heartbeat.interval(), MIN_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_keepalive_after_stop() {
        let transport = Arc::new(CountingTransport::default());
        let activity = SharedActivity::new(PlayerActivity::Active);
        let mut heartbeat = scheduler(&transport, &activity);

        heartbeat.start();
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(transport.started(), 2);

        heartbeat.stop().await;
        assert_eq!(heartbeat.state(), HeartbeatState::Idle);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(transport.started(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_in_flight_keepalive() {
        let transport = Arc::new(CountingTransport {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        let activity = SharedActivity::new(PlayerActivity::Active);
        let mut heartbeat = scheduler(&transport, &activity);

        heartbeat.start();
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(transport.started(), 1);
        assert_eq!(transport.completed(), 0);

        heartbeat.stop().await;
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(transport.started(), 1);
        assert_eq!(transport.completed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let transport = Arc::new(CountingTransport::default());
        let activity = SharedActivity::new(PlayerActivity::Active);
        let mut heartbeat = scheduler(&transport, &activity);

        heartbeat.start();
        heartbeat.stop().await;
        heartbeat.stop().await;
        heartbeat.start();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(transport.started(), 1);
        heartbeat.stop().await;
    }
}
