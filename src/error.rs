use std::time::Duration;

/// Failure of a single keepalive call. Never fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("keepalive timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("invalid capacity policy: trim count {trim_count} must be in 1..={high_water_mark}")]
    InvalidPolicy {
        high_water_mark: usize,
        trim_count: usize,
    },
}

/// The buffer settled above its high water mark. This is a defect in the
/// insertion path, not something callers can recover from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("buffer holds {len} messages, above high water mark {high_water_mark}")]
pub struct CapacityInvariantViolation {
    pub len: usize,
    pub high_water_mark: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("session dispatcher has shut down")]
    Closed,
}
