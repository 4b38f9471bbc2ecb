//! Recurring tasks.
//!
//! A repeating task carries an iCalendar-style rule (`FREQ=WEEKLY;BYDAY=MO,WE`)
//! and a due date. Marking it done creates the next occurrence: a fresh
//! pending task due at the first rule instant strictly after the completed
//! one. Every occurrence points at the first task of its chain through
//! `repeat_parent_id` and counts its position in `repeat_count`.
//!
//! ## Rule grammar
//!
//! `FREQ` (required) is one of `MINUTELY`, `HOURLY`, `DAILY`, `WEEKLY`,
//! `MONTHLY`, `YEARLY`. Optional parts: `INTERVAL`, `BYDAY` (`MO`..`SU`,
//! with a signed ordinal such as `-1FR` for monthly and yearly rules),
//! `BYMONTHDAY` (`1..31`, negative counts from the month's end), `BYMONTH`,
//! `COUNT`, `UNTIL` and `WKST`. An `RRULE:` prefix and a leading `DTSTART`
//! line are accepted; the due date is always the anchor. The bare words
//! `daily`, `weekly`, `monthly` and `yearly` are shorthands.
//!
//! Months that lack a requested day are skipped. All arithmetic is UTC and
//! keeps the anchor's time of day.

use crate::db::error::DbResult;
use crate::db::db::Db;
use crate::db::tasks::Tasks;
use crate::db::transaction::{atomic, with_lock};
use crate::libs::config::LockConfig;
use crate::libs::formatter::{format_timestamp, now_millis, to_utc};
use crate::libs::messages::Message;
use crate::libs::task::{Task, TaskFilter, TaskPatch, TaskStatus};
use crate::{msg_debug, msg_warning};
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use rusqlite::Connection;
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on periods examined when looking for the next instant.
const MAX_PERIODS: u32 = 10_000;
/// Sub-daily rules step one instant at a time and get a larger budget.
const MAX_SUBDAILY_STEPS: u32 = 600_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("recurrence rule is empty")]
    Empty,

    #[error("recurrence rule has no FREQ")]
    MissingFrequency,

    #[error("unknown frequency '{0}'")]
    UnknownFrequency(String),

    #[error("invalid {part} value '{value}'")]
    InvalidValue { part: &'static str, value: String },

    #[error("unsupported rule part '{0}'")]
    UnsupportedPart(String),

    #[error("malformed rule part '{0}'")]
    MalformedPart(String),

    #[error("task has no due date to anchor its rule")]
    MissingAnchor,

    #[error("due date {0} is out of range")]
    InvalidAnchor(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Frequency {
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn as_str(&self) -> &'static str {
        match self {
            Frequency::Minutely => "MINUTELY",
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MINUTELY" => Ok(Frequency::Minutely),
            "HOURLY" => Ok(Frequency::Hourly),
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            _ => Err(RecurrenceError::UnknownFrequency(s.to_string())),
        }
    }
}

/// A `BYDAY` entry: a weekday, optionally the n-th (or n-th from last) one
/// of the month or year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdaySpec {
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl Display for WeekdaySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.ordinal {
            write!(f, "{}", n)?;
        }
        f.write_str(weekday_code(self.weekday))
    }
}

/// A parsed recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatRule {
    pub freq: Frequency,
    pub interval: u32,
    pub by_day: Vec<WeekdaySpec>,
    pub by_month_day: Vec<i8>,
    pub by_month: Vec<u32>,
    /// Total occurrences in the chain, the first task included.
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
}

impl RepeatRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            count: None,
            until: None,
        }
    }

    pub fn interval(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// First instant generated by the rule strictly after `anchor`, with
    /// `anchor` as the series start. `None` when the rule runs out (`UNTIL`)
    /// or nothing matches within the search horizon.
    pub fn next_after(&self, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let next = match self.freq {
            Frequency::Minutely => self.next_subdaily(anchor, Duration::minutes(i64::from(self.interval))),
            Frequency::Hourly => self.next_subdaily(anchor, Duration::hours(i64::from(self.interval))),
            Frequency::Daily => self.next_daily(anchor),
            Frequency::Weekly => self.next_in_periods(anchor, |p| self.weekly_dates(anchor, p)),
            Frequency::Monthly => self.next_in_periods(anchor, |p| self.monthly_dates(anchor, p)),
            Frequency::Yearly => self.next_in_periods(anchor, |p| self.yearly_dates(anchor, p)),
        }?;

        match self.until {
            Some(until) if next > until => None,
            _ => Some(next),
        }
    }

    fn next_subdaily(&self, anchor: DateTime<Utc>, step: Duration) -> Option<DateTime<Utc>> {
        let mut candidate = anchor;
        for _ in 0..MAX_SUBDAILY_STEPS {
            candidate = candidate.checked_add_signed(step)?;
            if self.until.is_some_and(|until| candidate > until) {
                return None;
            }
            if self.matches_date(candidate.date_naive()) {
                return Some(candidate);
            }
        }
        None
    }

    fn next_daily(&self, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let time = anchor.time();
        let mut date = anchor.date_naive();
        for _ in 0..MAX_PERIODS {
            date = date.checked_add_days(Days::new(u64::from(self.interval)))?;
            let candidate = at_time(date, time);
            if self.until.is_some_and(|until| candidate > until) {
                return None;
            }
            if self.matches_date(date) {
                return Some(candidate);
            }
        }
        None
    }

    /// Walks periods `0, 1, 2, ..` (each `interval` units apart) and returns
    /// the first candidate after `anchor`.
    fn next_in_periods<F>(&self, anchor: DateTime<Utc>, dates_in_period: F) -> Option<DateTime<Utc>>
    where
        F: Fn(u32) -> Option<Vec<NaiveDate>>,
    {
        let time = anchor.time();
        for period in 0..MAX_PERIODS {
            let mut dates = dates_in_period(period)?;
            dates.sort();
            dates.dedup();

            let mut past_until = false;
            for date in dates {
                let candidate = at_time(date, time);
                if candidate <= anchor {
                    continue;
                }
                if self.until.is_some_and(|until| candidate > until) {
                    past_until = true;
                    break;
                }
                if self.by_month.is_empty() || self.by_month.contains(&date.month()) {
                    return Some(candidate);
                }
            }
            if past_until {
                return None;
            }
        }
        None
    }

    fn weekly_dates(&self, anchor: DateTime<Utc>, period: u32) -> Option<Vec<NaiveDate>> {
        let anchor_date = anchor.date_naive();
        let week_start = anchor_date.checked_sub_days(Days::new(u64::from(anchor_date.weekday().num_days_from_monday())))?;
        let start = week_start.checked_add_days(Days::new(7 * u64::from(period) * u64::from(self.interval)))?;

        if self.by_day.is_empty() {
            let offset = anchor_date.weekday().num_days_from_monday();
            return Some(vec![start.checked_add_days(Days::new(u64::from(offset)))?]);
        }
        Some(
            self.by_day
                .iter()
                .filter_map(|spec| start.checked_add_days(Days::new(u64::from(spec.weekday.num_days_from_monday()))))
                .collect(),
        )
    }

    fn monthly_dates(&self, anchor: DateTime<Utc>, period: u32) -> Option<Vec<NaiveDate>> {
        let (year, month) = add_months(anchor.year(), anchor.month(), period.checked_mul(self.interval)?)?;

        if !self.by_month_day.is_empty() {
            let days = resolve_month_days(year, month, &self.by_month_day);
            return Some(self.limit_by_weekday_in_month(year, month, days));
        }
        if !self.by_day.is_empty() {
            return Some(weekday_dates_in_month(year, month, &self.by_day));
        }
        Some(NaiveDate::from_ymd_opt(year, month, anchor.day()).into_iter().collect())
    }

    fn yearly_dates(&self, anchor: DateTime<Utc>, period: u32) -> Option<Vec<NaiveDate>> {
        let year = anchor.year().checked_add(i32::try_from(period.checked_mul(self.interval)?).ok()?)?;

        let expand_months = !self.by_month_day.is_empty() || !self.by_day.is_empty();
        let months: Vec<u32> = if !self.by_month.is_empty() {
            self.by_month.clone()
        } else if expand_months {
            (1..=12).collect()
        } else {
            vec![anchor.month()]
        };

        let mut dates = Vec::new();
        if !self.by_month_day.is_empty() {
            for &month in &months {
                let days = resolve_month_days(year, month, &self.by_month_day);
                dates.extend(self.limit_by_weekday_in_month(year, month, days));
            }
        } else if !self.by_day.is_empty() {
            if self.by_month.is_empty() {
                dates.extend(weekday_dates_in_year(year, &self.by_day));
            } else {
                for &month in &months {
                    dates.extend(weekday_dates_in_month(year, month, &self.by_day));
                }
            }
        } else {
            for &month in &months {
                dates.extend(NaiveDate::from_ymd_opt(year, month, anchor.day()));
            }
        }
        Some(dates)
    }

    fn limit_by_weekday_in_month(&self, year: i32, month: u32, dates: Vec<NaiveDate>) -> Vec<NaiveDate> {
        if self.by_day.is_empty() {
            return dates;
        }
        let allowed = weekday_dates_in_month(year, month, &self.by_day);
        dates.into_iter().filter(|d| allowed.contains(d)).collect()
    }

    /// Limits applied to daily and sub-daily rules.
    fn matches_date(&self, date: NaiveDate) -> bool {
        if !self.by_month.is_empty() && !self.by_month.contains(&date.month()) {
            return false;
        }
        if !self.by_month_day.is_empty() {
            let days = resolve_month_days(date.year(), date.month(), &self.by_month_day);
            if !days.contains(&date) {
                return false;
            }
        }
        if !self.by_day.is_empty() && !self.by_day.iter().any(|spec| spec.weekday == date.weekday()) {
            return false;
        }
        true
    }
}

impl FromStr for RepeatRule {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .find(|l| !l.to_ascii_uppercase().starts_with("DTSTART"))
            .ok_or(RecurrenceError::Empty)?;

        let body = match line.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("RRULE:") => &line[6..],
            _ => line,
        };

        match body.to_ascii_lowercase().as_str() {
            "daily" => return Ok(RepeatRule::new(Frequency::Daily)),
            "weekly" => return Ok(RepeatRule::new(Frequency::Weekly)),
            "monthly" => return Ok(RepeatRule::new(Frequency::Monthly)),
            "yearly" => return Ok(RepeatRule::new(Frequency::Yearly)),
            _ => {}
        }

        let mut freq = None;
        let mut rule = RepeatRule::new(Frequency::Daily);

        for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| RecurrenceError::MalformedPart(part.to_string()))?;
            let value = value.trim();

            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => freq = Some(value.parse::<Frequency>()?),
                "INTERVAL" => {
                    rule.interval = parse_number::<u32>("INTERVAL", value).and_then(|n| match n {
                        0 => Err(invalid("INTERVAL", value)),
                        n => Ok(n),
                    })?
                }
                "COUNT" => {
                    rule.count = Some(parse_number::<u32>("COUNT", value).and_then(|n| match n {
                        0 => Err(invalid("COUNT", value)),
                        n => Ok(n),
                    })?)
                }
                "UNTIL" => rule.until = Some(parse_until(value)?),
                "BYDAY" => {
                    rule.by_day = value.split(',').map(parse_weekday_spec).collect::<Result<_, _>>()?;
                }
                "BYMONTHDAY" => {
                    rule.by_month_day = value
                        .split(',')
                        .map(|v| {
                            let day = parse_number::<i8>("BYMONTHDAY", v.trim())?;
                            if day == 0 || !(-31..=31).contains(&day) {
                                return Err(invalid("BYMONTHDAY", v));
                            }
                            Ok(day)
                        })
                        .collect::<Result<_, _>>()?;
                }
                "BYMONTH" => {
                    rule.by_month = value
                        .split(',')
                        .map(|v| {
                            let month = parse_number::<u32>("BYMONTH", v.trim())?;
                            if !(1..=12).contains(&month) {
                                return Err(invalid("BYMONTH", v));
                            }
                            Ok(month)
                        })
                        .collect::<Result<_, _>>()?;
                }
                "WKST" => {
                    parse_weekday(value).ok_or_else(|| invalid("WKST", value))?;
                }
                other => return Err(RecurrenceError::UnsupportedPart(other.to_string())),
            }
        }

        rule.freq = freq.ok_or(RecurrenceError::MissingFrequency)?;
        Ok(rule)
    }
}

impl Display for RepeatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.freq.as_str())?;
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if !self.by_day.is_empty() {
            let days: Vec<String> = self.by_day.iter().map(|d| d.to_string()).collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }
        if !self.by_month_day.is_empty() {
            let days: Vec<String> = self.by_month_day.iter().map(|d| d.to_string()).collect();
            write!(f, ";BYMONTHDAY={}", days.join(","))?;
        }
        if !self.by_month.is_empty() {
            let months: Vec<String> = self.by_month.iter().map(|m| m.to_string()).collect();
            write!(f, ";BYMONTH={}", months.join(","))?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={}", count)?;
        }
        if let Some(until) = self.until {
            write!(f, ";UNTIL={}", until.format("%Y%m%dT%H%M%SZ"))?;
        }
        Ok(())
    }
}

fn invalid(part: &'static str, value: &str) -> RecurrenceError {
    RecurrenceError::InvalidValue {
        part,
        value: value.to_string(),
    }
}

fn parse_number<T: FromStr>(part: &'static str, value: &str) -> Result<T, RecurrenceError> {
    value.trim().trim_start_matches('+').parse::<T>().map_err(|_| invalid(part, value))
}

fn parse_until(value: &str) -> Result<DateTime<Utc>, RecurrenceError> {
    let trimmed = value.trim().trim_end_matches(['Z', 'z']);
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y%m%dT%H%M%S") {
        return Ok(Utc.from_utc_datetime(&dt));
    }
    // A date-only bound covers that whole day.
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y%m%d") {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).ok_or_else(|| invalid("UNTIL", value))?;
        return Ok(at_time(date, end_of_day));
    }
    Err(invalid("UNTIL", value))
}

fn parse_weekday(code: &str) -> Option<Weekday> {
    match code.trim().to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn parse_weekday_spec(value: &str) -> Result<WeekdaySpec, RecurrenceError> {
    let value = value.trim();
    if value.len() < 2 || !value.is_char_boundary(value.len() - 2) {
        return Err(invalid("BYDAY", value));
    }
    let (ordinal, code) = value.split_at(value.len() - 2);
    let weekday = parse_weekday(code).ok_or_else(|| invalid("BYDAY", value))?;
    let ordinal = if ordinal.is_empty() {
        None
    } else {
        let n = parse_number::<i8>("BYDAY", ordinal)?;
        if n == 0 || !(-53..=53).contains(&n) {
            return Err(invalid("BYDAY", value));
        }
        Some(n)
    };
    Ok(WeekdaySpec { ordinal, weekday })
}

fn at_time(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

fn add_months(year: i32, month: u32, months: u32) -> Option<(i32, u32)> {
    let zero_based = i64::from(month) - 1 + i64::from(months);
    let year = i64::from(year) + zero_based / 12;
    Some((i32::try_from(year).ok()?, (zero_based % 12) as u32 + 1))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Resolves `BYMONTHDAY` values for one month, dropping days it lacks.
fn resolve_month_days(year: i32, month: u32, days: &[i8]) -> Vec<NaiveDate> {
    let length = days_in_month(year, month) as i32;
    days.iter()
        .filter_map(|&day| {
            let day = i32::from(day);
            let resolved = if day > 0 { day } else { length + day + 1 };
            if resolved < 1 || resolved > length {
                return None;
            }
            NaiveDate::from_ymd_opt(year, month, resolved as u32)
        })
        .collect()
}

fn weekday_dates_in_month(year: i32, month: u32, specs: &[WeekdaySpec]) -> Vec<NaiveDate> {
    let all: Vec<NaiveDate> = (1..=days_in_month(year, month))
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .collect();
    select_weekdays(&all, specs)
}

fn weekday_dates_in_year(year: i32, specs: &[WeekdaySpec]) -> Vec<NaiveDate> {
    let all: Vec<NaiveDate> = (1..=12)
        .flat_map(|month| (1..=days_in_month(year, month)).filter_map(move |day| NaiveDate::from_ymd_opt(year, month, day)))
        .collect();
    select_weekdays(&all, specs)
}

/// Picks the dates of `span` matching `specs`, honouring ordinals relative
/// to the span.
fn select_weekdays(span: &[NaiveDate], specs: &[WeekdaySpec]) -> Vec<NaiveDate> {
    let mut selected = Vec::new();
    for spec in specs {
        let matching: Vec<NaiveDate> = span.iter().copied().filter(|d| d.weekday() == spec.weekday).collect();
        match spec.ordinal {
            None => selected.extend(matching),
            Some(n) if n > 0 => selected.extend(matching.get(n as usize - 1)),
            Some(n) => {
                let from_end = n.unsigned_abs() as usize;
                if from_end <= matching.len() {
                    selected.push(matching[matching.len() - from_end]);
                }
            }
        }
    }
    selected
}

/// Builds the occurrence that follows `task`, or `None` when the chain is
/// finished (`COUNT`, `UNTIL` or `repeat_until` reached) or the task does
/// not repeat.
pub fn successor_for(task: &Task) -> Result<Option<Task>, RecurrenceError> {
    let Some(rule_text) = task.repeat_rule.as_deref().filter(|r| !r.trim().is_empty()) else {
        return Ok(None);
    };
    let due_at = task.due_at.ok_or(RecurrenceError::MissingAnchor)?;
    let rule: RepeatRule = rule_text.parse()?;

    let repeat_count = task.repeat_count.unwrap_or(0);
    // The chain's first task is occurrence 1; its successor would be
    // occurrence repeat_count + 2.
    if rule.count.is_some_and(|count| repeat_count + 2 > count) {
        return Ok(None);
    }

    let anchor = to_utc(due_at).ok_or(RecurrenceError::InvalidAnchor(due_at))?;
    let Some(next) = rule.next_after(anchor) else {
        return Ok(None);
    };
    let next_due = next.timestamp_millis();
    if task.repeat_until.is_some_and(|until| next_due > until) {
        return Ok(None);
    }

    let mut checklist = task.checklist.clone();
    for item in checklist.iter_mut() {
        item.checked = false;
    }

    let now = now_millis();
    Ok(Some(Task {
        id: uuid::Uuid::new_v4().to_string(),
        title: task.title.clone(),
        due_at: Some(next_due),
        duration_min: task.duration_min,
        category_id: task.category_id.clone(),
        status: TaskStatus::Pending,
        checklist,
        repeat_rule: task.repeat_rule.clone(),
        repeat_parent_id: Some(task.chain_root().to_string()),
        repeat_count: Some(repeat_count + 1),
        repeat_until: task.repeat_until,
        created_at: now,
        updated_at: now,
    }))
}

/// Result of a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub task: Task,
    pub previous: TaskStatus,
    /// Occurrence created by completing a repeating task.
    pub successor: Option<Task>,
}

/// Sets a task's status and expands its recurrence.
///
/// Only a `pending -> done` transition of a task with both a rule and a due
/// date produces a successor, at most one per occurrence. Rule errors are
/// logged and never block the status change. Returns `None` for an unknown
/// id.
pub fn set_task_status(
    conn: &Connection,
    lock: &LockConfig,
    id: &str,
    status: TaskStatus,
) -> DbResult<Option<StatusChange>> {
    with_lock(conn, lock, &format!("recurrence:{}", id), |conn| {
        atomic(conn, |conn| {
            let tasks = Tasks::new(conn);
            let Some(before) = tasks.get(id)? else {
                return Ok(None);
            };
            tasks.update(id, &TaskPatch::status(status))?;

            let completes = before.status == TaskStatus::Pending && status == TaskStatus::Done;
            let successor = if completes && before.is_recurring() {
                expand(&tasks, &before)
            } else {
                None
            };

            let Some(task) = tasks.get(id)? else {
                return Ok(None);
            };
            Ok(Some(StatusChange {
                task,
                previous: before.status,
                successor,
            }))
        })
    })
}

fn expand(tasks: &Tasks<'_>, completed: &Task) -> Option<Task> {
    let next = match successor_for(completed) {
        Ok(Some(next)) => next,
        Ok(None) => {
            msg_debug!(Message::RecurrenceChainEnded(completed.title.clone()));
            return None;
        }
        Err(e) => {
            msg_warning!(Message::RecurrenceFailed(completed.title.clone(), e.to_string()));
            return None;
        }
    };

    // Completing the same occurrence twice must not fork the chain.
    match tasks.fetch(&TaskFilter::Chain(completed.chain_root().to_string())) {
        Ok(chain) if chain.iter().any(|t| t.repeat_count == next.repeat_count && t.id != completed.id) => {
            msg_debug!(Message::SuccessorAlreadyExists(completed.title.clone()));
            return None;
        }
        Ok(_) => {}
        Err(e) => {
            msg_warning!(Message::RecurrenceFailed(completed.title.clone(), e.to_string()));
            return None;
        }
    }

    match tasks.insert(&next) {
        Ok(()) => {
            msg_debug!(Message::SuccessorCreated(next.title.clone(), format_timestamp(next.due_at)));
            Some(next)
        }
        Err(e) => {
            msg_warning!(Message::RecurrenceFailed(completed.title.clone(), e.to_string()));
            None
        }
    }
}

impl Db {
    /// See [`set_task_status`].
    pub fn set_task_status(&self, id: &str, status: TaskStatus) -> DbResult<Option<StatusChange>> {
        set_task_status(&self.conn, &self.lock, id, status)
    }

    /// Flips `pending`/`done` (an archived task returns to pending).
    pub fn toggle_task_status(&self, id: &str) -> DbResult<Option<StatusChange>> {
        let Some(task) = self.tasks().get(id)? else {
            return Ok(None);
        };
        self.set_task_status(id, task.status.toggled())
    }
}
