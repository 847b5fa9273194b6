use tokio::sync::mpsc;

use super::dispatcher::SessionState;
use super::events::Message;
use super::heartbeat::HeartbeatState;

/// Outbound calls to whatever draws the chat pane. Invoked only from the
/// dispatcher's worker, one event at a time.
pub trait RenderSink: Send {
    fn on_message_inserted(&mut self, message: Message);
    fn on_messages_evicted(&mut self, messages: Vec<Message>);
    fn on_empty_changed(&mut self, is_empty: bool);
    fn on_scroll_to_bottom_requested(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderSignal {
    MessageInserted(Message),
    MessagesEvicted(Vec<Message>),
    EmptyChanged(bool),
    ScrollToBottomRequested,
}

/// Forwards every render call onto an unbounded channel so presentation code
/// can consume them on its own task.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RenderSignal>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RenderSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, signal: RenderSignal) {
        let _ = self.tx.send(signal);
    }
}

impl RenderSink for ChannelSink {
    fn on_message_inserted(&mut self, message: Message) {
        self.send(RenderSignal::MessageInserted(message));
    }

    fn on_messages_evicted(&mut self, messages: Vec<Message>) {
        self.send(RenderSignal::MessagesEvicted(messages));
    }

    fn on_empty_changed(&mut self, is_empty: bool) {
        self.send(RenderSignal::EmptyChanged(is_empty));
    }

    fn on_scroll_to_bottom_requested(&mut self) {
        self.send(RenderSignal::ScrollToBottomRequested);
    }
}

/// Immutable view of the session published after every processed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub heartbeat: HeartbeatState,
    pub message_count: usize,
    pub is_empty: bool,
    pub last_seq: Option<u64>,
    pub auto_scroll: bool,
}
