use std::collections::BTreeSet;

use chrono::{Days, NaiveDateTime, NaiveTime};

use crate::schedule::model::Segment;

// Holds the active schedule snapshot together with its derived change
// points. `reload` rebuilds both under one `&mut`, so a resolver shared
// behind a lock never exposes an old segment list with new change points.
pub struct ScheduleResolver {
    segments: Vec<Segment>,
    change_points: Vec<NaiveTime>,
}

impl ScheduleResolver {
    pub fn new(segments: Vec<Segment>) -> Self {
        let change_points = derive_change_points(&segments);
        Self {
            segments,
            change_points,
        }
    }

    pub fn reload(&mut self, segments: Vec<Segment>) {
        self.change_points = derive_change_points(&segments);
        self.segments = segments;
    }

    // First containing segment in list order wins when intervals overlap;
    // gaps and an empty schedule resolve to the unknown sentinel.
    pub fn current_segment(&self, now: NaiveTime) -> Segment {
        self.segments
            .iter()
            .find(|seg| time_in_range(now, seg.start, seg.end))
            .cloned()
            .unwrap_or_else(Segment::unknown)
    }

    pub fn next_change_datetime(&self, now: NaiveDateTime) -> NaiveDateTime {
        let Some(first) = self.change_points.first() else {
            return fallback_next_day(now);
        };

        let today = now.date();
        for change_point in &self.change_points {
            let candidate = today.and_time(*change_point);
            if candidate > now {
                return candidate;
            }
        }

        match today.checked_add_days(Days::new(1)) {
            Some(tomorrow) => tomorrow.and_time(*first),
            None => fallback_next_day(now),
        }
    }

    pub fn remaining_to_next_change(&self, now: NaiveDateTime) -> chrono::Duration {
        self.next_change_datetime(now) - now
    }
}

fn time_in_range(now: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        start <= now && now < end
    } else {
        // end < start means the interval wraps past midnight
        now >= start || now < end
    }
}

fn derive_change_points(segments: &[Segment]) -> Vec<NaiveTime> {
    let distinct: BTreeSet<NaiveTime> = segments.iter().map(|seg| seg.end).collect();
    distinct.into_iter().collect()
}

fn fallback_next_day(now: NaiveDateTime) -> NaiveDateTime {
    now.checked_add_days(Days::new(1)).unwrap_or(now)
}
