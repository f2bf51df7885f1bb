use std::sync::Mutex;

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Store-side clock. Every reading is strictly later than the previous one,
/// so server timestamps order writes by arrival even under client skew.
pub struct ServerClock {
    last: Mutex<DateTime<Utc>>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Truncated to the precision timestamps are stored with.
        let mut now = Utc::now().trunc_subsecs(6);
        if now <= *last {
            now = *last + Duration::microseconds(1);
        }
        *last = now;
        now
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}
