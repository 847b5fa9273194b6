#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use livesession::activity::{PlayerActivity, SharedActivity};
use livesession::config::SessionConfig;
use livesession::error::TransportError;
use livesession::session::{self, ChannelSink, DispatcherHandle, RenderSignal};
use livesession::transport::KeepaliveTransport;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Keepalive transport that only counts calls.
#[derive(Default)]
pub struct CountingTransport {
    calls: AtomicUsize,
}

impl CountingTransport {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeepaliveTransport for CountingTransport {
    async fn send_keepalive(&self) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A spawned session wired to a counting transport and a channel sink.
pub struct TestSession {
    pub handle: DispatcherHandle,
    pub worker: JoinHandle<()>,
    pub render_rx: mpsc::UnboundedReceiver<RenderSignal>,
    pub transport: Arc<CountingTransport>,
    pub activity: SharedActivity,
}

impl TestSession {
    pub fn spawn(config: SessionConfig) -> Self {
        let transport = Arc::new(CountingTransport::default());
        let activity = SharedActivity::new(PlayerActivity::Active);
        let (sink, render_rx) = ChannelSink::new();
        let (handle, worker) = session::spawn(
            "test-room",
            &config,
            transport.clone(),
            Arc::new(activity.clone()),
            Box::new(sink),
        );
        Self {
            handle,
            worker,
            render_rx,
            transport,
            activity,
        }
    }

    /// Drop the handle, wait for teardown and return every render signal.
    pub async fn finish(self) -> Vec<RenderSignal> {
        let TestSession {
            handle,
            worker,
            mut render_rx,
            ..
        } = self;
        drop(handle);
        worker.await.expect("session worker panicked");
        let mut signals = Vec::new();
        while let Some(signal) = render_rx.recv().await {
            signals.push(signal);
        }
        signals
    }
}
