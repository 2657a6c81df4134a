use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds since the unix epoch
pub type UnixTimestamp = i64;

/// Time source for round intervals
pub trait Clock {
    fn unix_timestamp(&self) -> UnixTimestamp;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_timestamp(&self) -> UnixTimestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(to_unix_timestamp)
            .unwrap_or_default()
    }
}

/// Whole seconds, clamped to the timestamp range
fn to_unix_timestamp(since_epoch: Duration) -> UnixTimestamp {
    UnixTimestamp::try_from(since_epoch.as_secs()).unwrap_or(UnixTimestamp::MAX)
}
