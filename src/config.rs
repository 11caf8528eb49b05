use std::fs;
use std::path::Path;

use chrono_tz::Tz;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::clock::TimeDisplayMode;

pub const FALLBACK_TIMEZONE: Tz = chrono_tz::Asia::Shanghai;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub time_format_24h: bool,
    pub timezone: String,
    pub sync_world_time: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            time_format_24h: true,
            timezone: "Asia/Shanghai".to_string(),
            sync_world_time: false,
        }
    }
}

impl AppSettings {
    // The settings store is external to this program; it is read as input
    // and never written back. Anything unreadable degrades to defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("unable to read settings file {}: {err}", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("invalid settings file {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn resolve_timezone(&self) -> Tz {
        match self.timezone.parse::<Tz>() {
            Ok(timezone) => timezone,
            Err(_) => {
                warn!(
                    "unknown timezone '{}', falling back to {}",
                    self.timezone, FALLBACK_TIMEZONE
                );
                FALLBACK_TIMEZONE
            }
        }
    }

    pub fn display_mode(&self) -> TimeDisplayMode {
        if self.time_format_24h {
            TimeDisplayMode::Hour24
        } else {
            TimeDisplayMode::Hour12
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let settings = AppSettings::load(&dir.path().join("settings.json"));
        assert!(settings.time_format_24h);
        assert_eq!(settings.timezone, "Asia/Shanghai");
        assert!(!settings.sync_world_time);
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "timezone": "Europe/London" }"#).expect("write");

        let settings = AppSettings::load(&path);
        assert_eq!(settings.timezone, "Europe/London");
        assert!(settings.time_format_24h);
        assert!(!settings.sync_world_time);
        assert_eq!(settings.resolve_timezone(), chrono_tz::Europe::London);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ nope").expect("write");

        let settings = AppSettings::load(&path);
        assert_eq!(settings.timezone, "Asia/Shanghai");
    }

    #[test]
    fn unknown_timezone_falls_back() {
        let settings = AppSettings {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..AppSettings::default()
        };
        assert_eq!(settings.resolve_timezone(), FALLBACK_TIMEZONE);
    }

    #[test]
    fn display_mode_follows_flag() {
        let mut settings = AppSettings::default();
        assert_eq!(settings.display_mode(), TimeDisplayMode::Hour24);
        settings.time_format_24h = false;
        assert_eq!(settings.display_mode(), TimeDisplayMode::Hour12);
    }
}
