use std::sync::{Arc, RwLock};

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TimeDisplayMode {
    Hour24,
    Hour12,
}

// Shared handle over the sync correction offset (network time minus local
// time). Cheap to clone; every clone reads and writes the same offset.
#[derive(Clone)]
pub struct CorrectedClock {
    offset: Arc<RwLock<chrono::Duration>>,
}

impl Default for CorrectedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrectedClock {
    pub fn new() -> Self {
        Self {
            offset: Arc::new(RwLock::new(chrono::Duration::zero())),
        }
    }

    pub fn offset(&self) -> chrono::Duration {
        self.offset
            .read()
            .map(|guard| *guard)
            .unwrap_or_else(|_| chrono::Duration::zero())
    }

    pub fn set_offset(&self, offset: chrono::Duration) {
        if let Ok(mut guard) = self.offset.write() {
            *guard = offset;
        }
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        Utc::now() + self.offset()
    }

    pub fn now_in(&self, timezone: Tz) -> DateTime<Tz> {
        self.now_utc().with_timezone(&timezone)
    }
}

pub fn format_clock_time(now: &DateTime<Tz>, mode: TimeDisplayMode) -> String {
    match mode {
        TimeDisplayMode::Hour24 => format!(
            "{:02}:{:02}:{:02}",
            now.hour(),
            now.minute(),
            now.second()
        ),
        TimeDisplayMode::Hour12 => {
            let (is_pm, hour12) = now.hour12();
            let meridiem = if is_pm { "PM" } else { "AM" };
            format!(
                "{:02}:{:02}:{:02} {}",
                hour12,
                now.minute(),
                now.second(),
                meridiem
            )
        }
    }
}
