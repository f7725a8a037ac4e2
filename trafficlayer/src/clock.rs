//! Wall-clock helper.
//!
//! Network message timestamps are epoch milliseconds UTC, so the engine
//! keeps all timekeeping in that unit. Monotonic time (`std::time`) is only
//! used for task scheduling intervals.

use chrono::Utc;

/// Current wall-clock time as epoch milliseconds UTC.
#[inline]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_recent() {
        // Sanity: after 2023-01-01, before 2100
        let now = now_ms();
        assert!(now > 1_672_531_200_000);
        assert!(now < 4_102_444_800_000);
    }
}
