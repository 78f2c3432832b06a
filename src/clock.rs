use chrono::Utc;
use mockall::automock;

/// Milliseconds since the unix epoch.
pub type EpochMs = i64;

#[automock]
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> EpochMs;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> EpochMs {
        Utc::now().timestamp_millis()
    }
}
