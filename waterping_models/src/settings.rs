use std::{fmt, str::FromStr, time::Duration};

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid time of day {0:?}, expected HH:MM")]
    InvalidTimeOfDay(String),

    #[error("Invalid reminder interval {0}, expected one of 30, 45, 60 or 90 minutes")]
    InvalidInterval(u32),
}

/// Local wall-clock time with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(inner: NaiveTime) -> Self {
        let normalized_time = inner
            .with_second(0)
            .and_then(|time| time.with_nanosecond(0))
            .expect("Will never fail.");
        Self(normalized_time)
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn time(&self) -> &NaiveTime {
        &self.0
    }

    /// Minutes elapsed since local midnight, in `0..1440`.
    pub fn minutes_since_midnight(&self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }
}

impl FromStr for TimeOfDay {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SettingsError::InvalidTimeOfDay(s.to_owned());

        let (hours, minutes) = s.trim().split_once(':').ok_or_else(invalid)?;
        let is_number = |part: &str, max_len: usize| {
            !part.is_empty() && part.len() <= max_len && part.chars().all(|c| c.is_ascii_digit())
        };

        if !is_number(hours, 2) || !is_number(minutes, 2) || minutes.len() != 2 {
            return Err(invalid());
        }

        let hours = hours.parse().map_err(|_| invalid())?;
        let minutes = minutes.parse().map_err(|_| invalid())?;

        Self::from_hm(hours, minutes).ok_or_else(invalid)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = SettingsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ReminderInterval {
    ThirtyMinutes,
    FortyFiveMinutes,
    #[default]
    SixtyMinutes,
    NinetyMinutes,
}

impl ReminderInterval {
    pub const ALL: [ReminderInterval; 4] = [
        ReminderInterval::ThirtyMinutes,
        ReminderInterval::FortyFiveMinutes,
        ReminderInterval::SixtyMinutes,
        ReminderInterval::NinetyMinutes,
    ];

    pub fn minutes(&self) -> u32 {
        match self {
            ReminderInterval::ThirtyMinutes => 30,
            ReminderInterval::FortyFiveMinutes => 45,
            ReminderInterval::SixtyMinutes => 60,
            ReminderInterval::NinetyMinutes => 90,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(u64::from(self.minutes()) * 60_000)
    }
}

impl TryFrom<u32> for ReminderInterval {
    type Error = SettingsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.minutes() == value)
            .ok_or(SettingsError::InvalidInterval(value))
    }
}

impl From<ReminderInterval> for u32 {
    fn from(value: ReminderInterval) -> Self {
        value.minutes()
    }
}

impl fmt::Display for ReminderInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}

/// Snapshot of the user's reminder configuration. Every change produces a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub wake_time: TimeOfDay,
    pub sleep_time: TimeOfDay,
    pub interval: ReminderInterval,
    pub is_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wake_time: TimeOfDay::from_hm(8, 0).expect("This is always in bounds."),
            sleep_time: TimeOfDay::from_hm(22, 0).expect("This is always in bounds."),
            interval: ReminderInterval::SixtyMinutes,
            is_enabled: false,
        }
    }
}

impl Settings {
    pub fn with_enabled(self, is_enabled: bool) -> Self {
        Self { is_enabled, ..self }
    }

    pub fn apply(self, patch: &SettingsPatch) -> Self {
        Self {
            wake_time: patch.wake_time.unwrap_or(self.wake_time),
            sleep_time: patch.sleep_time.unwrap_or(self.sleep_time),
            interval: patch.interval.unwrap_or(self.interval),
            is_enabled: self.is_enabled,
        }
    }
}

/// Partial edit of [`Settings`]. Enabling is never part of a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub wake_time: Option<TimeOfDay>,
    pub sleep_time: Option<TimeOfDay>,
    pub interval: Option<ReminderInterval>,
}

impl SettingsPatch {
    pub fn wake_time(wake_time: TimeOfDay) -> Self {
        Self {
            wake_time: Some(wake_time),
            ..Default::default()
        }
    }

    pub fn sleep_time(sleep_time: TimeOfDay) -> Self {
        Self {
            sleep_time: Some(sleep_time),
            ..Default::default()
        }
    }

    pub fn interval(interval: ReminderInterval) -> Self {
        Self {
            interval: Some(interval),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.wake_time.is_none() && self.sleep_time.is_none() && self.interval.is_none()
    }
}
