use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SCHEDULE_JSON: &str = r#"[
  { "start": "08:00", "end": "08:45", "state": "in-session", "course_name": "Period 1", "next_hint": "Class ends in:" },
  { "start": "08:45", "end": "08:55", "state": "break", "course_name": "", "next_hint": "Class starts in:" },
  { "start": "08:55", "end": "09:40", "state": "in-session", "course_name": "Period 2", "next_hint": "Class ends in:" },
  { "start": "09:40", "end": "09:50", "state": "break", "course_name": "", "next_hint": "Class starts in:" },
  { "start": "09:50", "end": "10:35", "state": "in-session", "course_name": "Period 3", "next_hint": "Class ends in:" },
  { "start": "10:35", "end": "10:45", "state": "break", "course_name": "", "next_hint": "Class starts in:" },
  { "start": "10:45", "end": "11:30", "state": "in-session", "course_name": "Period 4", "next_hint": "Class ends in:" },
  { "start": "11:30", "end": "13:00", "state": "dismissed", "course_name": "", "next_hint": "Class starts in:" },
  { "start": "13:00", "end": "13:45", "state": "in-session", "course_name": "Period 5", "next_hint": "Class ends in:" },
  { "start": "13:45", "end": "13:55", "state": "break", "course_name": "", "next_hint": "Class starts in:" },
  { "start": "13:55", "end": "14:40", "state": "in-session", "course_name": "Period 6", "next_hint": "Class ends in:" },
  { "start": "14:40", "end": "14:50", "state": "break", "course_name": "", "next_hint": "Class starts in:" },
  { "start": "14:50", "end": "15:35", "state": "in-session", "course_name": "Period 7", "next_hint": "Class ends in:" },
  { "start": "15:35", "end": "15:45", "state": "break", "course_name": "", "next_hint": "Class starts in:" },
  { "start": "15:45", "end": "16:30", "state": "in-session", "course_name": "Period 8", "next_hint": "Class ends in:" },
  { "start": "16:30", "end": "18:00", "state": "dismissed", "course_name": "", "next_hint": "Class starts in:" },
  { "start": "18:00", "end": "18:45", "state": "in-session", "course_name": "Period 9", "next_hint": "Class ends in:" },
  { "start": "18:45", "end": "18:55", "state": "break", "course_name": "", "next_hint": "Class starts in:" },
  { "start": "18:55", "end": "19:40", "state": "in-session", "course_name": "Period 10", "next_hint": "Class ends in:" },
  { "start": "19:40", "end": "19:50", "state": "break", "course_name": "", "next_hint": "Class starts in:" },
  { "start": "19:50", "end": "20:30", "state": "in-session", "course_name": "Period 11", "next_hint": "Class ends in:" },
  { "start": "20:30", "end": "08:00", "state": "dismissed", "course_name": "", "next_hint": "Class starts in:" }
]
"#;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SegmentState {
    InSession,
    Break,
    Dismissed,
    Unknown,
}

impl SegmentState {
    pub fn from_token(raw: &str) -> Option<Self> {
        match raw {
            "in-session" => Some(SegmentState::InSession),
            "break" => Some(SegmentState::Break),
            "dismissed" => Some(SegmentState::Dismissed),
            "unknown" => Some(SegmentState::Unknown),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            SegmentState::InSession => "in-session",
            SegmentState::Break => "break",
            SegmentState::Dismissed => "dismissed",
            SegmentState::Unknown => "unknown",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SegmentState::InSession => "in session",
            SegmentState::Break => "break",
            SegmentState::Dismissed => "dismissed",
            SegmentState::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Segment {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub state: SegmentState,
    pub course_name: String,
    pub next_hint: String,
}

impl Segment {
    pub fn unknown() -> Self {
        Self {
            start: NaiveTime::MIN,
            end: NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
            state: SegmentState::Unknown,
            course_name: String::new(),
            next_hint: String::new(),
        }
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ScheduleRowError {
    #[error("row {row}: invalid {field} time '{value}', expected HH:MM")]
    InvalidTime {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("row {row}: unknown state '{value}'")]
    UnknownState { row: usize, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSegment {
    pub start: String,
    pub end: String,
    pub state: String,
    #[serde(default)]
    pub course_name: String,
    #[serde(default)]
    pub next_hint: String,
}

pub fn load_schedule(path: &Path) -> Result<Vec<Segment>> {
    if !path.exists() {
        let segments = parse_schedule_text(DEFAULT_SCHEDULE_JSON)?;
        if let Err(err) = save_schedule(path, &segments) {
            warn!(
                "unable to write default schedule {}: {err:#}",
                path.display()
            );
        }
        return Ok(segments);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read schedule file {}", path.display()))?;
    parse_schedule_text(&content)
}

pub fn load_or_default(path: &Path) -> Vec<Segment> {
    match load_schedule(path) {
        Ok(segments) => segments,
        Err(err) => {
            warn!("failed to load schedule {}: {err:#}", path.display());
            Vec::new()
        }
    }
}

pub fn parse_schedule_text(content: &str) -> Result<Vec<Segment>> {
    let raw = serde_json::from_str::<Vec<RawSegment>>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;
    Ok(segments_from_raw(&raw)?)
}

pub fn segments_from_raw(raw: &[RawSegment]) -> Result<Vec<Segment>, ScheduleRowError> {
    let mut segments = Vec::with_capacity(raw.len());
    for (index, entry) in raw.iter().enumerate() {
        let row = index + 1;
        let state = SegmentState::from_token(&entry.state).ok_or_else(|| {
            ScheduleRowError::UnknownState {
                row,
                value: entry.state.clone(),
            }
        })?;
        segments.push(Segment {
            start: parse_day_time(row, "start", &entry.start)?,
            end: parse_day_time(row, "end", &entry.end)?,
            state,
            course_name: entry.course_name.clone(),
            next_hint: entry.next_hint.clone(),
        });
    }
    Ok(segments)
}

pub fn save_schedule(path: &Path, segments: &[Segment]) -> Result<()> {
    let text = serde_json::to_string_pretty(&raw_from_segments(segments))?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, format!("{text}\n"))
        .with_context(|| format!("unable to write schedule file {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("unable to replace schedule file {}", path.display()))?;
    Ok(())
}

fn parse_day_time(
    row: usize,
    field: &'static str,
    value: &str,
) -> Result<NaiveTime, ScheduleRowError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| ScheduleRowError::InvalidTime {
        row,
        field,
        value: value.to_string(),
    })
}

fn format_day_time(value: NaiveTime) -> String {
    format!("{:02}:{:02}", value.hour(), value.minute())
}

fn raw_from_segments(segments: &[Segment]) -> Vec<RawSegment> {
    segments
        .iter()
        .map(|seg| RawSegment {
            start: format_day_time(seg.start),
            end: format_day_time(seg.end),
            state: seg.state.as_token().to_string(),
            course_name: seg.course_name.clone(),
            next_hint: seg.next_hint.clone(),
        })
        .collect()
}
