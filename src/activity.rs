use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// What the media player is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerActivity {
    NotLoaded,
    Active,
    Ended,
}

impl PlayerActivity {
    /// Whether a heartbeat tick should actually reach the upstream.
    pub fn wants_keepalive(self) -> bool {
        matches!(self, PlayerActivity::Active)
    }

    fn to_u8(self) -> u8 {
        match self {
            PlayerActivity::NotLoaded => 0,
            PlayerActivity::Active => 1,
            PlayerActivity::Ended => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => PlayerActivity::Active,
            2 => PlayerActivity::Ended,
            _ => PlayerActivity::NotLoaded,
        }
    }
}

/// Synchronous, side-effect-free read of player state.
pub trait ActivityProbe: Send + Sync {
    fn current_activity(&self) -> PlayerActivity;
}

/// Lock-free cell the player side writes and the heartbeat reads.
#[derive(Debug, Clone)]
pub struct SharedActivity {
    inner: Arc<AtomicU8>,
}

impl SharedActivity {
    pub fn new(initial: PlayerActivity) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(initial.to_u8())),
        }
    }

    pub fn set(&self, activity: PlayerActivity) {
        self.inner.store(activity.to_u8(), Ordering::Relaxed);
    }
}

impl Default for SharedActivity {
    fn default() -> Self {
        Self::new(PlayerActivity::NotLoaded)
    }
}

impl ActivityProbe for SharedActivity {
    fn current_activity(&self) -> PlayerActivity {
        PlayerActivity::from_u8(self.inner.load(Ordering::Relaxed))
    }
}
