//! Policy conditions and their parsers

use crate::action::Action;
use crate::resource::Resource;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use reka_config::{ActiveDurationConfig, ConditionConfig};
use std::fmt;

/// Zone-less timestamp layouts accepted for destruction dates
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M",
    "%d-%m-%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y"];

/// The single policy condition a rule carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Destroy once `now >= date`
    TerminationDate(DateTime<FixedOffset>),
    /// Stop outside the window, resume inside it
    ActiveDuration(ActiveWindow),
    /// Destroy resources flagged by the policy
    TerminationPolicy(TerminationPolicy),
}

impl Condition {
    /// Map a config condition block to a condition.
    ///
    /// Exactly one kind must be set. Relative destruction dates resolve
    /// against `base`.
    pub fn from_config(config: &ConditionConfig, base: DateTime<FixedOffset>) -> Result<Self, String> {
        match config.count() {
            0 => return Err("no condition specified".to_string()),
            1 => {}
            _ => return Err("multiple conditions specified".to_string()),
        }

        if let Some(window) = &config.active_duration {
            return ActiveWindow::from_config(window).map(Condition::ActiveDuration);
        }
        if let Some(date) = &config.termination_date {
            return parse_termination_date(date, base).map(Condition::TerminationDate);
        }
        if let Some(policy) = &config.termination_policy {
            return policy.parse().map(Condition::TerminationPolicy);
        }

        Err("no condition specified".to_string())
    }

    /// Action this condition asks for on `resource` at `now`
    pub fn evaluate(&self, resource: &Resource, now: DateTime<FixedOffset>) -> Action {
        match self {
            Condition::TerminationDate(date) => {
                if now >= *date {
                    Action::Destroy
                } else {
                    Action::DoNothing
                }
            }
            Condition::ActiveDuration(window) => {
                let inside = window.contains(now.time());
                if !inside && resource.is_active() {
                    Action::Stop
                } else if inside && resource.is_stopped() {
                    Action::Resume
                } else {
                    Action::DoNothing
                }
            }
            Condition::TerminationPolicy(TerminationPolicy::Unused) => {
                if resource.is_unused() {
                    Action::Destroy
                } else {
                    Action::DoNothing
                }
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Condition::TerminationDate(_) => "destruction-date",
            Condition::ActiveDuration(_) => "active-duration",
            Condition::TerminationPolicy(_) => "destruction-policy",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::TerminationDate(date) => write!(f, "destruction-date {}", date.to_rfc3339()),
            Condition::ActiveDuration(window) => write!(f, "active-duration {}", window),
            Condition::TerminationPolicy(policy) => write!(f, "destruction-policy {}", policy),
        }
    }
}

/// Daily window during which resources should be running.
///
/// The window is open after `start` and up to and including `stop`. A window
/// whose stop is earlier than its start wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start: NaiveTime,
    pub stop: NaiveTime,
}

impl ActiveWindow {
    pub fn new(start: NaiveTime, stop: NaiveTime) -> Self {
        Self { start, stop }
    }

    pub fn from_config(config: &ActiveDurationConfig) -> Result<Self, String> {
        let start = parse_clock_time(&config.start_time)
            .ok_or_else(|| format!("invalid active-duration start time `{}`", config.start_time))?;
        let stop = parse_clock_time(&config.stop_time)
            .ok_or_else(|| format!("invalid active-duration stop time `{}`", config.stop_time))?;
        Ok(Self::new(start, stop))
    }

    /// Parse `HH:MM-HH:MM` (also `7am-8pm`)
    pub fn parse_range(value: &str) -> Result<Self, String> {
        let (start, stop) = value
            .split_once('-')
            .ok_or_else(|| format!("invalid active-duration `{}`, expected START-STOP", value))?;
        Self::from_config(&ActiveDurationConfig {
            start_time: start.trim().to_string(),
            stop_time: stop.trim().to_string(),
        })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.stop {
            self.start < time && time <= self.stop
        } else {
            time > self.start || time <= self.stop
        }
    }
}

impl fmt::Display for ActiveWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.stop.format("%H:%M"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPolicy {
    Unused,
}

impl std::str::FromStr for TerminationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unused" => Ok(TerminationPolicy::Unused),
            "" => Err("empty destruction-policy".to_string()),
            other => Err(format!(
                "unknown destruction-policy `{}` (expected `unused`)",
                other
            )),
        }
    }
}

impl fmt::Display for TerminationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationPolicy::Unused => write!(f, "unused"),
        }
    }
}

/// Parse a time of day: `17:00`, `17:00:30`, `7pm`, `7:30am`
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim().to_lowercase();
    let (clock, meridiem) = if let Some(rest) = value.strip_suffix("am") {
        (rest.trim(), Some(false))
    } else if let Some(rest) = value.strip_suffix("pm") {
        (rest.trim(), Some(true))
    } else {
        (value.as_str(), None)
    };

    let mut parts = clock.split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = match parts.next() {
        Some(m) => m.parse().ok()?,
        None if meridiem.is_some() => 0,
        None => return None,
    };
    let second: u32 = match parts.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }

    let hour = match meridiem {
        Some(pm) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            }
        }
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Parse a relative duration such as `10h`, `1d12h`, `1.5h`, `90m` or `45s`
pub fn parse_relative_duration(value: &str) -> Option<Duration> {
    let value: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if value.is_empty() {
        return None;
    }

    let mut total = Duration::zero();
    let mut amount = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() || c == '.' {
            amount.push(c);
            continue;
        }
        if amount.is_empty() {
            return None;
        }
        let unit_ms: f64 = match c {
            'w' => 7.0 * 86_400_000.0,
            'd' => 86_400_000.0,
            'h' => 3_600_000.0,
            'm' => 60_000.0,
            's' => 1_000.0,
            _ => return None,
        };
        let millis = amount.parse::<f64>().ok()? * unit_ms;
        amount.clear();
        if !millis.is_finite() || millis > i64::MAX as f64 {
            return None;
        }
        total = total.checked_add(&Duration::try_milliseconds(millis.round() as i64)?)?;
    }

    // trailing number without a unit
    if !amount.is_empty() {
        return None;
    }
    Some(total)
}

/// Parse a destruction date.
///
/// Accepts a relative duration (resolved against `base`), an RFC 3339
/// timestamp, a zone-less date/time interpreted in `base`'s offset, or a
/// bare time of day on `base`'s date.
pub fn parse_termination_date(
    value: &str,
    base: DateTime<FixedOffset>,
) -> Result<DateTime<FixedOffset>, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("empty destruction-date".to_string());
    }

    if let Some(duration) = parse_relative_duration(trimmed) {
        return base
            .checked_add_signed(duration)
            .ok_or_else(|| format!("destruction-date `{}` is out of range", trimmed));
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(date);
    }

    let offset = *base.offset();
    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|format| {
                NaiveDate::parse_from_str(trimmed, format)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
        })
        .or_else(|| parse_clock_time(trimmed).map(|time| base.date_naive().and_time(time)));

    naive
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .ok_or_else(|| format!("unable to parse destruction-date `{}`", trimmed))
}
