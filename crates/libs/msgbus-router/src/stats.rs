use std::time::{Duration, Instant};

/// Minimum sampling window before `messages_per_second` is recomputed.
pub const STATS_WINDOW: Duration = Duration::from_secs(15);

/// Point-in-time router counters, mirroring the role `ConnectionStatistics`
/// plays for a single connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct RouterStats {
    pub forwarded_messages: u64,
    pub dropped_messages: u64,
    pub sent_messages: u64,
    pub messages_per_second: f64,
}

/// Smoothed average message age, bucketed to milliseconds. Tracks whether
/// the bucket changed since the last broadcast so `do_maintenance` knows
/// when to emit a fresh `"msgFlowInf"`.
pub struct AgeTracker {
    window_start: Instant,
    window_forwarded: u64,
    sum_age_quarter_seconds: i64,
    last_broadcast_bucket_ms: u32,
}

impl Default for AgeTracker {
    fn default() -> Self {
        AgeTracker {
            window_start: Instant::now(),
            window_forwarded: 0,
            sum_age_quarter_seconds: 0,
            last_broadcast_bucket_ms: 0,
        }
    }
}

impl AgeTracker {
    /// Bucket width: ages within the same 50ms bucket don't trigger a new
    /// broadcast, avoiding a flow-info storm on every tiny fluctuation.
    const BUCKET_MS: u32 = 50;

    pub fn record(&mut self, age_quarter_seconds: msgbus_wire::AgeQuarterSeconds) {
        self.window_forwarded += 1;
        self.sum_age_quarter_seconds += age_quarter_seconds.max(0) as i64;
    }

    fn average_age_ms(&self) -> u32 {
        if self.window_forwarded == 0 {
            return 0;
        }
        let avg_quarter_seconds = self.sum_age_quarter_seconds / self.window_forwarded as i64;
        (avg_quarter_seconds * 250).clamp(0, u32::MAX as i64) as u32
    }

    fn bucket(&self) -> u32 {
        self.average_age_ms() / Self::BUCKET_MS
    }

    /// Call once per `do_maintenance` tick. Returns `None` until at least
    /// [`STATS_WINDOW`] has elapsed since the last call; once it has,
    /// returns the window's throughput (`messages_per_second`) plus
    /// `Some(avg_age_ms)` exactly when the bucketed average age changed
    /// enough to warrant a fresh `"msgFlowInf"` broadcast. The sampling
    /// window resets either way.
    pub fn maybe_window_stats(&mut self, now: Instant) -> Option<WindowStats> {
        let elapsed = now.duration_since(self.window_start);
        if elapsed < STATS_WINDOW {
            return None;
        }
        let bucket = self.bucket();
        let avg = self.average_age_ms();
        let messages_per_second = self.window_forwarded as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
        self.window_start = now;
        self.window_forwarded = 0;
        self.sum_age_quarter_seconds = 0;
        let flow_broadcast_ms = if bucket != self.last_broadcast_bucket_ms {
            self.last_broadcast_bucket_ms = bucket;
            Some(avg)
        } else {
            None
        };
        Some(WindowStats {
            messages_per_second,
            flow_broadcast_ms,
        })
    }
}

/// One sampling window's worth of router throughput, returned by
/// [`AgeTracker::maybe_window_stats`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub messages_per_second: f64,
    pub flow_broadcast_ms: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_update_before_window_elapses() {
        let mut tracker = AgeTracker::default();
        tracker.record(40);
        assert_eq!(tracker.maybe_window_stats(Instant::now()), None);
    }

    #[test]
    fn update_fires_once_bucket_changes_after_window() {
        let mut tracker = AgeTracker::default();
        tracker.record(40);
        let later = Instant::now() + STATS_WINDOW + Duration::from_millis(1);
        let window = tracker.maybe_window_stats(later).expect("window elapsed");
        assert!(window.flow_broadcast_ms.is_some());
        // Same bucket again: no repeat broadcast, but throughput still reports.
        tracker.record(40);
        let later2 = later + STATS_WINDOW + Duration::from_millis(1);
        let window2 = tracker.maybe_window_stats(later2).expect("window elapsed");
        assert_eq!(window2.flow_broadcast_ms, None);
        assert!(window2.messages_per_second > 0.0);
    }
}
