use std::collections::VecDeque;

use chrono::Utc;

use super::events::{Message, MessagePayload};
use crate::error::{CapacityError, CapacityInvariantViolation};

pub const DEFAULT_HIGH_WATER_MARK: usize = 1000;
pub const DEFAULT_TRIM_COUNT: usize = 400;

/// When the buffer grows past `high_water_mark`, the oldest `trim_count`
/// messages are dropped in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPolicy {
    high_water_mark: usize,
    trim_count: usize,
}

impl CapacityPolicy {
    pub fn new(high_water_mark: usize, trim_count: usize) -> Result<Self, CapacityError> {
        if trim_count == 0 || trim_count > high_water_mark {
            return Err(CapacityError::InvalidPolicy {
                high_water_mark,
                trim_count,
            });
        }
        Ok(Self {
            high_water_mark,
            trim_count,
        })
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    pub fn trim_count(&self) -> usize {
        self.trim_count
    }

    pub fn low_water_mark(&self) -> usize {
        self.high_water_mark - self.trim_count
    }
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            trim_count: DEFAULT_TRIM_COUNT,
        }
    }
}

/// Result of a single [`MessageBuffer::insert`].
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    pub inserted: Message,
    /// Oldest first. Empty unless this insertion crossed the high water mark.
    pub evicted: Vec<Message>,
    /// `Some(new_value)` when the empty flag flipped.
    pub empty_changed: Option<bool>,
}

/// Bounded, display-ordered store of recent messages.
///
/// Single writer: the session dispatcher owns it and nothing else mutates it,
/// so there is no locking here.
#[derive(Debug)]
pub struct MessageBuffer {
    messages: VecDeque<Message>,
    policy: CapacityPolicy,
    next_seq: u64,
}

impl MessageBuffer {
    pub fn new(policy: CapacityPolicy) -> Self {
        Self {
            messages: VecDeque::new(),
            policy,
            next_seq: 1,
        }
    }

    pub fn policy(&self) -> CapacityPolicy {
        self.policy
    }

    /// Append `payload` and, if that pushes the length over the high water
    /// mark, evict the oldest `trim_count` entries before returning.
    pub fn insert(&mut self, payload: MessagePayload) -> InsertOutcome {
        let was_empty = self.messages.is_empty();

        let inserted = Message {
            seq: self.next_seq,
            received_at: Utc::now(),
            payload,
        };
        self.next_seq += 1;
        self.messages.push_back(inserted.clone());

        let evicted: Vec<Message> = if self.messages.len() > self.policy.high_water_mark() {
            self.messages.drain(..self.policy.trim_count()).collect()
        } else {
            Vec::new()
        };

        if !evicted.is_empty() {
            tracing::debug!(
                evicted = evicted.len(),
                remaining = self.messages.len(),
                "trimmed message buffer"
            );
        }

        if let Err(violation) = self.check_capacity() {
            tracing::error!("{violation}");
            debug_assert!(false, "{violation}");
        }

        InsertOutcome {
            inserted,
            evicted,
            empty_changed: was_empty.then_some(false),
        }
    }

    /// Drop everything. Sequence numbers keep counting from where they were.
    pub fn clear(&mut self) -> Vec<Message> {
        self.messages.drain(..).collect()
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.messages.back().map(|m| m.seq)
    }

    /// Display order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    pub fn check_capacity(&self) -> Result<(), CapacityInvariantViolation> {
        if self.messages.len() > self.policy.high_water_mark() {
            return Err(CapacityInvariantViolation {
                len: self.messages.len(),
                high_water_mark: self.policy.high_water_mark(),
            });
        }
        Ok(())
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new(CapacityPolicy::default())
    }
}
