pub mod buffer;
pub mod dispatcher;
pub mod events;
pub mod heartbeat;
pub mod render;

pub use buffer::{CapacityPolicy, InsertOutcome, MessageBuffer};
pub use dispatcher::{spawn, DispatcherHandle, SessionState, SessionWorker};
pub use events::{Message, MessagePayload, SessionEvent};
pub use heartbeat::{HeartbeatScheduler, HeartbeatState};
pub use render::{ChannelSink, RenderSignal, RenderSink, SessionStatus};
