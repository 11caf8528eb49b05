use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::clock::{CorrectedClock, TimeDisplayMode, format_clock_time};
use crate::schedule::model::SegmentState;
use crate::schedule::resolver::ScheduleResolver;

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub clock_text: String,
    pub state_label: String,
    pub course_text: String,
    pub hint_label: String,
    pub countdown_text: String,
}

impl StatusSnapshot {
    pub fn status_line(&self) -> String {
        format!(
            "{} | {} | {} | {} {}",
            self.clock_text, self.state_label, self.course_text, self.hint_label,
            self.countdown_text
        )
    }
}

pub fn build_snapshot(
    resolver: &ScheduleResolver,
    now_local: &DateTime<Tz>,
    mode: TimeDisplayMode,
) -> StatusSnapshot {
    let now_naive = now_local.naive_local();
    let segment = resolver.current_segment(now_naive.time());
    let remaining = resolver.remaining_to_next_change(now_naive);

    let course_text = if segment.state == SegmentState::InSession && !segment.course_name.is_empty()
    {
        segment.course_name.clone()
    } else {
        "-".to_string()
    };
    let hint_label = if segment.next_hint.is_empty() {
        "Next:".to_string()
    } else {
        segment.next_hint.clone()
    };

    StatusSnapshot {
        clock_text: format_clock_time(now_local, mode),
        state_label: segment.state.label().to_string(),
        course_text,
        hint_label,
        countdown_text: format_countdown(remaining),
    }
}

pub fn format_countdown(remaining: chrono::Duration) -> String {
    let total_seconds = remaining.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

// Periodic read path: lock, resolve, hand the snapshot to the callback.
// No I/O happens on this thread; the stop flag is polled at 200 ms
// granularity so shutdown never waits out a full tick interval.
pub struct TickDriver {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl TickDriver {
    pub fn start<F>(
        resolver: Arc<RwLock<ScheduleResolver>>,
        clock: CorrectedClock,
        timezone: Tz,
        mode: TimeDisplayMode,
        interval: Duration,
        mut on_tick: F,
    ) -> Self
    where
        F: FnMut(StatusSnapshot) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let join = thread::spawn(move || {
            while !stop_for_thread.load(Ordering::Relaxed) {
                let snapshot = resolver.read().ok().map(|guard| {
                    let now_local = clock.now_in(timezone);
                    build_snapshot(&guard, &now_local, mode)
                });
                if let Some(snapshot) = snapshot {
                    on_tick(snapshot);
                }

                let mut slept = Duration::ZERO;
                while slept < interval && !stop_for_thread.load(Ordering::Relaxed) {
                    let slice = (interval - slept).min(Duration::from_millis(200));
                    thread::sleep(slice);
                    slept += slice;
                }
            }
        });

        Self {
            stop,
            join: Some(join),
        }
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use chrono::TimeZone;
    use chrono_tz::Asia::Shanghai;

    use super::*;
    use crate::schedule::model::{DEFAULT_SCHEDULE_JSON, parse_schedule_text};

    fn default_resolver() -> ScheduleResolver {
        ScheduleResolver::new(parse_schedule_text(DEFAULT_SCHEDULE_JSON).expect("default parses"))
    }

    fn shanghai(hour: u32, minute: u32) -> DateTime<Tz> {
        Shanghai
            .with_ymd_and_hms(2026, 3, 2, hour, minute, 0)
            .single()
            .expect("valid datetime")
    }

    #[test]
    fn snapshot_during_first_period() {
        let resolver = default_resolver();
        let snapshot = build_snapshot(&resolver, &shanghai(8, 10), TimeDisplayMode::Hour24);

        assert_eq!(snapshot.clock_text, "08:10:00");
        assert_eq!(snapshot.state_label, "in session");
        assert_eq!(snapshot.course_text, "Period 1");
        assert_eq!(snapshot.hint_label, "Class ends in:");
        assert_eq!(snapshot.countdown_text, "35:00");
    }

    #[test]
    fn snapshot_hides_course_outside_sessions() {
        let resolver = default_resolver();
        let snapshot = build_snapshot(&resolver, &shanghai(8, 50), TimeDisplayMode::Hour24);

        assert_eq!(snapshot.state_label, "break");
        assert_eq!(snapshot.course_text, "-");
        assert_eq!(snapshot.hint_label, "Class starts in:");
        assert_eq!(snapshot.countdown_text, "05:00");
    }

    #[test]
    fn snapshot_for_empty_schedule_uses_sentinel_and_hint_fallback() {
        let resolver = ScheduleResolver::new(Vec::new());
        let snapshot = build_snapshot(&resolver, &shanghai(12, 0), TimeDisplayMode::Hour24);

        assert_eq!(snapshot.state_label, "unknown");
        assert_eq!(snapshot.course_text, "-");
        assert_eq!(snapshot.hint_label, "Next:");
        assert_eq!(snapshot.countdown_text, "24:00:00");
    }

    #[test]
    fn countdown_formats_with_hour_threshold_and_zero_clamp() {
        assert_eq!(format_countdown(chrono::Duration::seconds(-5)), "00:00");
        assert_eq!(format_countdown(chrono::Duration::seconds(59)), "00:59");
        assert_eq!(format_countdown(chrono::Duration::seconds(3599)), "59:59");
        assert_eq!(format_countdown(chrono::Duration::seconds(3600)), "01:00:00");
        assert_eq!(
            format_countdown(chrono::Duration::seconds(25 * 3600 + 61)),
            "25:01:01"
        );
    }

    #[test]
    fn status_line_joins_all_fields() {
        let resolver = default_resolver();
        let line = build_snapshot(&resolver, &shanghai(8, 10), TimeDisplayMode::Hour24)
            .status_line();
        assert_eq!(line, "08:10:00 | in session | Period 1 | Class ends in: 35:00");
    }

    #[test]
    fn tick_driver_delivers_snapshots_then_stops() {
        let resolver = Arc::new(RwLock::new(default_resolver()));
        let clock = CorrectedClock::new();
        let (tx, rx) = mpsc::channel();

        let driver = TickDriver::start(
            resolver,
            clock,
            chrono_tz::UTC,
            TimeDisplayMode::Hour24,
            Duration::from_millis(10),
            move |snapshot| {
                let _ = tx.send(snapshot);
            },
        );

        for _ in 0..3 {
            let snapshot = rx
                .recv_timeout(Duration::from_secs(2))
                .expect("tick delivered");
            assert!(!snapshot.clock_text.is_empty());
        }

        drop(driver);
        // The callback is gone once the worker is joined; the channel closes.
        while rx.recv_timeout(Duration::from_millis(50)).is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
