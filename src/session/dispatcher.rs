use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::buffer::MessageBuffer;
use super::events::{MessagePayload, SessionEvent};
use super::heartbeat::HeartbeatScheduler;
use super::render::{RenderSink, SessionStatus};
use crate::activity::ActivityProbe;
use crate::config::SessionConfig;
use crate::error::DispatchError;
use crate::transport::KeepaliveTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotConnected,
    Connected,
}

/// Owns the buffer and heartbeat and applies events to them one at a time.
///
/// Nothing here locks: the worker is the only writer. Use [`spawn`] to put it
/// behind a channel when events come from more than one task.
pub struct SessionWorker {
    state: SessionState,
    buffer: MessageBuffer,
    heartbeat: HeartbeatScheduler,
    sink: Box<dyn RenderSink>,
    auto_scroll: bool,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionWorker {
    pub fn new(
        config: &SessionConfig,
        transport: Arc<dyn KeepaliveTransport>,
        activity: Arc<dyn ActivityProbe>,
        sink: Box<dyn RenderSink>,
    ) -> Self {
        let buffer = MessageBuffer::new(config.capacity);
        let heartbeat = HeartbeatScheduler::new(config.heartbeat_interval, transport, activity);
        let (status_tx, _) = watch::channel(SessionStatus {
            state: SessionState::NotConnected,
            heartbeat: heartbeat.state(),
            message_count: 0,
            is_empty: true,
            last_seq: None,
            auto_scroll: config.auto_scroll,
        });
        Self {
            state: SessionState::NotConnected,
            buffer,
            heartbeat,
            sink,
            auto_scroll: config.auto_scroll,
            status_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    pub fn heartbeat(&self) -> &HeartbeatScheduler {
        &self.heartbeat
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            heartbeat: self.heartbeat.state(),
            message_count: self.buffer.count(),
            is_empty: self.buffer.is_empty(),
            last_seq: self.buffer.last_seq(),
            auto_scroll: self.auto_scroll,
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub async fn handle(&mut self, event: SessionEvent) {
        tracing::trace!(kind = event.kind(), "handling session event");
        match event {
            SessionEvent::ConnectSuccess => {
                if self.state == SessionState::NotConnected {
                    tracing::info!("session connected");
                }
                self.state = SessionState::Connected;
                self.heartbeat.start();
            }
            SessionEvent::Message(payload) => self.on_message(payload),
            SessionEvent::Disconnect => self.disconnect().await,
            SessionEvent::SetAutoScroll(enabled) => {
                tracing::debug!(enabled, "auto scroll changed");
                self.auto_scroll = enabled;
            }
            SessionEvent::Other(kind) => {
                tracing::debug!(kind = %kind, "ignoring unknown session event");
            }
        }
        self.status_tx.send_replace(self.status());
    }

    fn on_message(&mut self, payload: MessagePayload) {
        let outcome = self.buffer.insert(payload);
        tracing::trace!(
            seq = outcome.inserted.seq,
            author = %outcome.inserted.payload.author,
            "message inserted"
        );

        self.sink.on_message_inserted(outcome.inserted);
        if !outcome.evicted.is_empty() {
            self.sink.on_messages_evicted(outcome.evicted);
        }
        if let Some(is_empty) = outcome.empty_changed {
            self.sink.on_empty_changed(is_empty);
        }
        if self.auto_scroll {
            self.sink.on_scroll_to_bottom_requested();
        }
    }

    async fn disconnect(&mut self) {
        self.heartbeat.stop().await;
        if self.state == SessionState::Connected {
            tracing::info!("session disconnected");
        }
        self.state = SessionState::NotConnected;
    }

    /// Session teardown: stop the heartbeat and release every buffered
    /// message back to the sink.
    pub async fn shutdown(&mut self) {
        self.disconnect().await;
        let cleared = self.buffer.clear();
        if !cleared.is_empty() {
            self.sink.on_messages_evicted(cleared);
            self.sink.on_empty_changed(true);
        }
        self.status_tx.send_replace(self.status());
    }

    /// Drain `rx` until every sender is gone, then tear the session down.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        tracing::info!("event stream closed, tearing down session");
        self.shutdown().await;
    }
}

/// Cloneable entry point for the transport. Any task or thread may dispatch;
/// events are processed in the order the channel receives them.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    status: watch::Receiver<SessionStatus>,
}

impl DispatcherHandle {
    pub fn dispatch(&self, event: SessionEvent) -> Result<(), DispatchError> {
        self.tx.send(event).map_err(|_| DispatchError::Closed)
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }
}

/// Start a session worker on its own task. The worker exits, tearing the
/// session down, once every [`DispatcherHandle`] clone has been dropped.
pub fn spawn(
    room_id: &str,
    config: &SessionConfig,
    transport: Arc<dyn KeepaliveTransport>,
    activity: Arc<dyn ActivityProbe>,
    sink: Box<dyn RenderSink>,
) -> (DispatcherHandle, JoinHandle<()>) {
    let worker = SessionWorker::new(config, transport, activity, sink);
    let status = worker.subscribe_status();
    let (tx, rx) = mpsc::unbounded_channel();

    let span = tracing::info_span!("session", room_id = %room_id);
    let task = tokio::spawn(worker.run(rx).instrument(span));

    (DispatcherHandle { tx, status }, task)
}
