//! Update schedule evaluation
//!
//! A schedule decides whether a scheduled run should fire at a given instant:
//! - `daily`, `weekly` (configured weekday, Monday by default)
//! - `monthly`, `quarterly`, `semiannually`, `yearly` (1st of qualifying months)
//! - `cron` (5-field expression: minute hour day-of-month month day-of-week)
//!
//! An optional `time` restricts runs to ±30 minutes around a local time of day.
//! Anything unrecognized is permissive: an unknown interval, a malformed time
//! or a malformed cron field never blocks a run.

use crate::error::ScheduleError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Minutes on either side of the configured time during which a run may fire
const WINDOW_MINUTES: i64 = 30;

/// How far ahead `next_run_time` searches before giving up
const SEARCH_DAYS: i64 = 400;

/// Schedule configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// daily, weekly, monthly, quarterly, semiannually, yearly or cron
    pub interval: Option<String>,
    /// Weekday for weekly schedules
    pub day: Option<String>,
    /// Local time of day, `HH:MM`
    pub time: Option<String>,
    /// IANA timezone name, UTC when unset
    pub timezone: Option<String>,
    /// Cron expression for the `cron` interval
    pub cron: Option<String>,
}

/// Whether a schedule fires now, and when it fires next
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleStatus {
    pub configured: bool,
    pub should_run: bool,
    pub timezone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
}

impl ScheduleStatus {
    /// Status of a repository without a schedule: every run goes ahead
    pub fn unscheduled() -> Self {
        Self {
            configured: false,
            should_run: true,
            timezone: Tz::UTC.name().to_string(),
            next_run: None,
        }
    }
}

/// Evaluates a [`Schedule`] in its configured timezone
#[derive(Debug, Clone)]
pub struct ScheduleChecker {
    schedule: Schedule,
    tz: Tz,
}

impl ScheduleChecker {
    /// Create a checker, resolving the schedule's timezone
    pub fn new(schedule: Schedule) -> Result<Self, ScheduleError> {
        let tz = match schedule.timezone.as_deref().map(str::trim) {
            None | Some("") => Tz::UTC,
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ScheduleError::InvalidTimezone {
                    timezone: name.to_string(),
                })?,
        };

        Ok(Self { schedule, tz })
    }

    /// The resolved timezone
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Returns true if a run scheduled at `now` should go ahead
    pub fn should_run(&self, now: DateTime<Utc>) -> bool {
        let Some(interval) = self.interval() else {
            return true;
        };

        let local = now.with_timezone(&self.tz).naive_local();

        // Near midnight the slot being matched may belong to the adjacent day
        let slot_date = match self.time_of_day() {
            Some((hour, minute)) => match window_slot(local, hour, minute) {
                Some(slot) => slot.date(),
                None => return false,
            },
            None => local.date(),
        };

        if interval == "cron" {
            return match self.schedule.cron.as_deref() {
                Some(expr) => cron_matches(expr, local),
                None => true,
            };
        }

        self.day_matches(&interval, slot_date)
    }

    /// Computes the next instant after `now` at which the schedule fires
    pub fn next_run_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let Some(interval) = self.interval() else {
            return now;
        };

        if interval == "cron" {
            return match self.schedule.cron.as_deref() {
                Some(expr) => self.next_cron_time(expr, now).unwrap_or(now),
                None => now,
            };
        }

        if !is_known_interval(&interval) {
            return now;
        }

        let (hour, minute) = self.time_of_day().unwrap_or((0, 0));
        let today = now.with_timezone(&self.tz).date_naive();

        for offset in 0..SEARCH_DAYS {
            let date = today + Duration::days(offset);
            if !self.day_matches(&interval, date) {
                continue;
            }
            let Some(naive) = date.and_hms_opt(hour, minute, 0) else {
                continue;
            };
            // Local times skipped by a DST transition have no instant
            let Some(candidate) = self.tz.from_local_datetime(&naive).earliest() else {
                continue;
            };
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return candidate;
            }
        }

        now
    }

    /// Snapshot of the schedule at `now`
    pub fn status(&self, now: DateTime<Utc>) -> ScheduleStatus {
        ScheduleStatus {
            configured: self.interval().is_some(),
            should_run: self.should_run(now),
            timezone: self.tz.name().to_string(),
            next_run: Some(self.next_run_time(now)),
        }
    }

    fn interval(&self) -> Option<String> {
        self.schedule
            .interval
            .as_deref()
            .map(|i| i.trim().to_ascii_lowercase())
            .filter(|i| !i.is_empty())
    }

    fn time_of_day(&self) -> Option<(u32, u32)> {
        let (hour, minute) = self.schedule.time.as_deref()?.trim().split_once(':')?;
        let hour: u32 = hour.parse().ok()?;
        let minute: u32 = minute.parse().ok()?;
        (hour < 24 && minute < 60).then_some((hour, minute))
    }

    fn weekday(&self) -> Weekday {
        self.schedule
            .day
            .as_deref()
            .and_then(|d| d.trim().parse::<Weekday>().ok())
            .unwrap_or(Weekday::Mon)
    }

    fn day_matches(&self, interval: &str, date: NaiveDate) -> bool {
        match interval {
            "daily" => true,
            "weekly" => date.weekday() == self.weekday(),
            "monthly" => date.day() == 1,
            "quarterly" => date.day() == 1 && matches!(date.month(), 1 | 4 | 7 | 10),
            "semiannually" => date.day() == 1 && matches!(date.month(), 1 | 7),
            "yearly" | "annually" => date.day() == 1 && date.month() == 1,
            _ => true,
        }
    }

    fn next_cron_time(&self, expr: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = now.with_timezone(&self.tz).naive_local();
        let start = local.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Some(now);
        }

        let mut date = start.date();
        for _ in 0..SEARCH_DAYS {
            if cron_day_matches(&fields, date) {
                for hour in 0..24 {
                    if !field_matches(fields[1], hour) {
                        continue;
                    }
                    for minute in 0..60 {
                        if !field_matches(fields[0], minute) {
                            continue;
                        }
                        let naive = date.and_hms_opt(hour, minute, 0)?;
                        if naive < start {
                            continue;
                        }
                        if let Some(candidate) = self.tz.from_local_datetime(&naive).earliest() {
                            return Some(candidate.with_timezone(&Utc));
                        }
                    }
                }
            }
            date = date.succ_opt()?;
        }

        None
    }
}

fn is_known_interval(interval: &str) -> bool {
    matches!(
        interval,
        "daily" | "weekly" | "monthly" | "quarterly" | "semiannually" | "yearly" | "annually"
    )
}

/// The `hour:minute` slot on the previous, same or next day that `local` falls near
fn window_slot(local: NaiveDateTime, hour: u32, minute: u32) -> Option<NaiveDateTime> {
    let today = local.date();
    [today.pred_opt(), Some(today), today.succ_opt()]
        .into_iter()
        .flatten()
        .filter_map(|date| date.and_hms_opt(hour, minute, 0))
        .find(|slot| (local - *slot).num_minutes().abs() <= WINDOW_MINUTES)
}

/// Matches a 5-field cron expression against a local timestamp
///
/// Expressions without exactly five fields match everything.
pub fn cron_matches(expr: &str, local: NaiveDateTime) -> bool {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return true;
    }

    field_matches(fields[0], local.minute())
        && field_matches(fields[1], local.hour())
        && cron_day_matches(&fields, local.date())
}

fn cron_day_matches(fields: &[&str], date: NaiveDate) -> bool {
    let weekday = date.weekday().num_days_from_sunday();
    field_matches(fields[2], date.day())
        && field_matches(fields[3], date.month())
        && (field_matches(fields[4], weekday) || (weekday == 0 && field_matches(fields[4], 7)))
}

/// Matches one cron field: `*`, `*/n`, `a-b`, `n` and comma lists of those
fn field_matches(field: &str, value: u32) -> bool {
    if field == "*" {
        return true;
    }

    if let Some(step) = field.strip_prefix("*/") {
        return match step.parse::<u32>() {
            Ok(n) if n > 0 => value % n == 0,
            _ => true,
        };
    }

    for part in field.split(',') {
        if let Some((start, end)) = part.split_once('-') {
            let (Ok(start), Ok(end)) = (start.parse::<u32>(), end.parse::<u32>()) else {
                return true;
            };
            if (start..=end).contains(&value) {
                return true;
            }
        } else {
            let Ok(n) = part.parse::<u32>() else {
                return true;
            };
            if n == value {
                return true;
            }
        }
    }

    false
}
