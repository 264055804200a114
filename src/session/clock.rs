use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Wall-clock milliseconds derived from a fixed anchor plus Tokio's monotonic
/// clock. Session deadlines therefore follow the same time source as the
/// timers that enforce them, and wall-clock jumps during a run are ignored.
#[derive(Clone, Copy, Debug)]
pub struct SessionClock {
    anchor_ms: i64,
    anchor: Instant,
}

impl SessionClock {
    /// Anchors at the current system time.
    #[must_use]
    pub fn system() -> Self {
        let anchor_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
        Self::starting_at(anchor_ms)
    }

    /// Anchors at an explicit epoch timestamp in milliseconds.
    #[must_use]
    pub fn starting_at(anchor_ms: i64) -> Self {
        Self {
            anchor_ms,
            anchor: Instant::now(),
        }
    }

    #[must_use]
    pub fn now_ms(&self) -> i64 {
        let elapsed = Instant::now().duration_since(self.anchor).as_millis();
        self.anchor_ms
            .saturating_add(i64::try_from(elapsed).unwrap_or(i64::MAX))
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::system()
    }
}
