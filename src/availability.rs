//! Daily availability windows ("maintenance" blackouts) and the gates built on them.
//!
//! Every gate in the application (general app availability, match scheduling) consults the same
//! evaluator, [`is_within_blocked_window`].

use std::fmt;

use chrono::{NaiveTime, Timelike};

/// Number of minutes in a day.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Wall-clock minute of the day, always in `[0, 1440)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinuteOfDay(u16);
impl MinuteOfDay {
    /// From hours (`0..24`) and minutes (`0..60`).
    pub fn new(hours: u16, minutes: u16) -> Option<Self> {
        (hours < 24 && minutes < 60).then_some(Self(hours * 60 + minutes))
    }

    /// From minutes since midnight.
    pub fn from_total(total: u16) -> Option<Self> {
        (total < MINUTES_PER_DAY).then_some(Self(total))
    }

    /// Parses a 24-hour `"HH:MM"` string.
    pub fn parse(s: &str) -> Option<Self> {
        let time = NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()?;
        Self::new(time.hour() as u16, time.minute() as u16)
    }

    /// Local minute of the day for a unix timestamp, given the local offset from UTC.
    pub fn from_unix_millis(unix_millis: i64, utc_offset_minutes: i32) -> Self {
        let minutes = unix_millis.div_euclid(60_000) + i64::from(utc_offset_minutes);
        Self(minutes.rem_euclid(i64::from(MINUTES_PER_DAY)) as u16)
    }

    /// Minutes since midnight.
    pub fn get(self) -> u16 {
        self.0
    }
}
impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Whether `now` falls inside the daily window `[start, end)`.
///
/// A window with `start > end` wraps past midnight. If either bound is missing (or not a valid
/// `"HH:MM"`) the window never blocks.
///
/// `start == end` takes the same-day branch and so never blocks, even though an administrator
/// might have meant "always closed". Callers rely on this staying as is.
pub fn is_within_blocked_window(start: Option<&str>, end: Option<&str>, now: MinuteOfDay) -> bool {
    let (Some(start_str), Some(end_str)) = (start, end) else {
        return false;
    };
    let (Some(start), Some(end)) = (MinuteOfDay::parse(start_str), MinuteOfDay::parse(end_str))
    else {
        log::warn!(
            "Ignoring malformed availability window `{}`-`{}`.",
            start_str,
            end_str
        );
        return false;
    };

    if start > end {
        // Overnight, e.g. 22:00-10:00.
        now >= start || now < end
    } else {
        now >= start && now < end
    }
}

/// Administrator-configured availability of a single feature.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AvailabilityWindow {
    /// Unconditional off switch.
    pub is_disabled: bool,
    /// If the daily window below is in effect.
    pub scheduled: bool,
    /// `"HH:MM"` start of the daily blackout (inclusive).
    pub start_time: Option<String>,
    /// `"HH:MM"` end of the daily blackout (exclusive).
    pub end_time: Option<String>,
}
impl AvailabilityWindow {
    /// Why the feature is blocked at `now`, if it is.
    pub fn blocked_reason(&self, now: MinuteOfDay) -> Option<BlockReason> {
        if self.is_disabled {
            Some(BlockReason::Disabled)
        } else if self.scheduled
            && is_within_blocked_window(self.start_time.as_deref(), self.end_time.as_deref(), now)
        {
            Some(BlockReason::Scheduled)
        } else {
            None
        }
    }

    /// If the feature is blocked at `now`.
    pub fn is_blocked(&self, now: MinuteOfDay) -> bool {
        self.blocked_reason(now).is_some()
    }
}

/// Why a gate is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The unconditional switch is on.
    Disabled,
    /// Inside the daily window.
    Scheduled,
}

/// Result of consulting a gate.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Availability {
    /// Render normally.
    Open,
    /// Render the blocked shell instead.
    Blocked {
        /// Why.
        reason: BlockReason,
        /// Message to show users.
        message: String,
    },
}
impl Availability {
    /// If this is [`Availability::Open`].
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// The features that have a gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    /// The whole application.
    App,
    /// Creating and joining matches.
    Matches,
}

/// The `settings/maintenance` document.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaintenanceSettings {
    /// See [`AvailabilityWindow::is_disabled`].
    pub is_app_disabled: bool,
    /// Shown while the app is blocked.
    pub app_disabled_message: Option<String>,
    /// See [`AvailabilityWindow::scheduled`].
    pub app_scheduled: bool,
    /// `"HH:MM"`.
    pub app_start_time: Option<String>,
    /// `"HH:MM"`.
    pub app_end_time: Option<String>,

    /// See [`AvailabilityWindow::is_disabled`].
    pub is_match_disabled: bool,
    /// Shown while matches are blocked.
    pub match_disabled_message: Option<String>,
    /// See [`AvailabilityWindow::scheduled`].
    pub match_scheduled: bool,
    /// `"HH:MM"`.
    pub match_start_time: Option<String>,
    /// `"HH:MM"`.
    pub match_end_time: Option<String>,
}
impl MaintenanceSettings {
    /// Default message shown while the app is blocked.
    pub const DEFAULT_APP_MESSAGE: &'static str =
        "Ludo League is under maintenance. Please check back soon.";
    /// Default message shown while matches are blocked.
    pub const DEFAULT_MATCH_MESSAGE: &'static str =
        "Matches are not available right now. Please check back later.";

    /// The window for `gate`.
    pub fn window(&self, gate: Gate) -> AvailabilityWindow {
        match gate {
            Gate::App => AvailabilityWindow {
                is_disabled: self.is_app_disabled,
                scheduled: self.app_scheduled,
                start_time: self.app_start_time.clone(),
                end_time: self.app_end_time.clone(),
            },
            Gate::Matches => AvailabilityWindow {
                is_disabled: self.is_match_disabled,
                scheduled: self.match_scheduled,
                start_time: self.match_start_time.clone(),
                end_time: self.match_end_time.clone(),
            },
        }
    }

    /// Consult `gate` at `now`.
    pub fn check(&self, gate: Gate, now: MinuteOfDay) -> Availability {
        let Some(reason) = self.window(gate).blocked_reason(now) else {
            return Availability::Open;
        };
        let message = match gate {
            Gate::App => self
                .app_disabled_message
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_APP_MESSAGE.to_owned()),
            Gate::Matches => self
                .match_disabled_message
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MATCH_MESSAGE.to_owned()),
        };
        Availability::Blocked { reason, message }
    }
}
