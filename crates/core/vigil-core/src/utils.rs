//! Utility functions and helpers shared by Vigil crates.

use std::time::Duration;

/// Time-related utilities
pub mod time {
    use super::Duration;

    /// Convert a duration to whole milliseconds, saturating at `u64::MAX`
    #[must_use]
    pub fn duration_to_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Format duration as human-readable string
    #[must_use]
    pub fn format_duration(duration: Duration) -> String {
        let total_ms = duration_to_millis(duration);
        if total_ms < 1000 {
            return format!("{total_ms}ms");
        }

        let secs = duration.as_secs();
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{hours}h {minutes}m {seconds}s")
        } else if minutes > 0 {
            format!("{minutes}m {seconds}s")
        } else {
            format!("{:.1}s", duration.as_secs_f64())
        }
    }
}

/// Rate limiting utilities
pub mod rate_limit {
    use std::collections::VecDeque;
    use std::time::{Duration, Instant};

    /// Sliding-window counter: at most `limit` acquisitions within any
    /// trailing `window`.
    ///
    /// Only the instants of granted acquisitions are kept, so memory is
    /// bounded by `limit`.
    #[derive(Debug, Clone)]
    pub struct SlidingWindow {
        limit: usize,
        window: Duration,
        granted: VecDeque<Instant>,
    }

    impl SlidingWindow {
        /// Create a new sliding window
        #[must_use]
        pub fn new(limit: usize, window: Duration) -> Self {
            Self {
                limit,
                window,
                granted: VecDeque::with_capacity(limit),
            }
        }

        /// Try to acquire a slot at the current instant
        pub fn try_acquire(&mut self) -> bool {
            self.try_acquire_at(Instant::now())
        }

        /// Try to acquire a slot at `now`
        pub fn try_acquire_at(&mut self, now: Instant) -> bool {
            self.expire(now);
            if self.granted.len() >= self.limit {
                return false;
            }
            self.granted.push_back(now);
            true
        }

        /// Number of acquisitions still inside the window at `now`
        pub fn in_window_at(&mut self, now: Instant) -> usize {
            self.expire(now);
            self.granted.len()
        }

        /// Configured limit
        #[must_use]
        pub fn limit(&self) -> usize {
            self.limit
        }

        /// Configured window length
        #[must_use]
        pub fn window(&self) -> Duration {
            self.window
        }

        fn expire(&mut self, now: Instant) {
            while let Some(oldest) = self.granted.front() {
                if now.saturating_duration_since(*oldest) >= self.window {
                    self.granted.pop_front();
                } else {
                    break;
                }
            }
        }
    }
}
