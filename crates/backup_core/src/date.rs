//! Posted-date normalization.
//!
//! Feed timestamps come in several shapes: `May 24`, `Mon`, `Today`,
//! `Yesterday`, compact relative forms (`5mo`, `2y`, `3d`, `4h`, `10m`) and
//! occasionally a full date. Everything resolves to a UTC instant relative to
//! a caller-supplied `now`.

use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, SecondsFormat, Utc,
};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%m/%d/%Y"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse feed date text against `now`. Returns `None` for anything it cannot
/// resolve to a valid instant.
pub fn parse_posted_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = strip_updated_prefix(text.trim());
    if text.is_empty() {
        return None;
    }

    if let Some((month, day)) = split_month_day(text) {
        return resolve_month_day(month, day, now);
    }

    if let Some(weekday) = WEEKDAYS.iter().position(|day| text.contains(day)) {
        let today = i64::from(now.weekday().num_days_from_sunday());
        let mut days_ago = today - weekday as i64;
        if days_ago <= 0 {
            days_ago += 7;
        }
        return now.checked_sub_signed(Duration::days(days_ago));
    }

    if text.contains("Today") {
        return Some(now);
    }
    if text.contains("Yesterday") {
        return now.checked_sub_signed(Duration::days(1));
    }

    // Unit tokens are matched by containment, first hit wins.
    if let Some(amount) = leading_integer(text) {
        if text.contains("mo") {
            return now.checked_sub_months(Months::new(amount));
        }
        if text.contains('y') {
            return amount
                .checked_mul(12)
                .and_then(|months| now.checked_sub_months(Months::new(months)));
        }
        if text.contains('d') {
            return now.checked_sub_signed(Duration::days(i64::from(amount)));
        }
        if text.contains('h') {
            return now.checked_sub_signed(Duration::hours(i64::from(amount)));
        }
        if text.contains('m') {
            return now.checked_sub_signed(Duration::minutes(i64::from(amount)));
        }
    }

    parse_absolute(text)
}

/// [`parse_posted_date`] against the current time, formatted for storage.
pub fn normalize_posted_date(text: &str) -> Option<String> {
    parse_posted_date(text, Utc::now()).map(format_timestamp)
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn strip_updated_prefix(text: &str) -> &str {
    match (text.get(..7), text.get(7..)) {
        (Some(prefix), Some(rest))
            if prefix.eq_ignore_ascii_case("updated")
                && rest.starts_with(char::is_whitespace) =>
        {
            rest.trim_start()
        }
        _ => text,
    }
}

/// Matches `^[A-Za-z]{3} \d{1,2}$`.
fn split_month_day(text: &str) -> Option<(&str, u32)> {
    let (month, day) = text.split_once(' ')?;
    let month_ok = month.len() == 3 && month.chars().all(|c| c.is_ascii_alphabetic());
    let day_ok = (1..=2).contains(&day.len()) && day.chars().all(|c| c.is_ascii_digit());
    if month_ok && day_ok {
        day.parse().ok().map(|day| (month, day))
    } else {
        None
    }
}

fn resolve_month_day(month: &str, day: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(month))
        .map(|index| index as u32 + 1)?;
    let candidate = rolled_date(now.year(), month, day)?;
    let resolved = if candidate > now.date_naive() {
        // Moving back a year keeps the resolved month and day, so a rolled
        // date stays rolled and Feb 29 of a non-leap year becomes Mar 1.
        rolled_date(now.year() - 1, candidate.month(), candidate.day())?
    } else {
        candidate
    };
    resolved.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

/// Calendar date with day overflow carried into the following months, so
/// `Feb 30` lands on an early March day and day 0 is the previous month's last.
fn rolled_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_signed(Duration::days(i64::from(day) - 1))
}

/// Leading unsigned integer, so `"12h ago"` reads as 12.
fn leading_integer(text: &str) -> Option<u32> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}
