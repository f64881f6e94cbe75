use backup_core::{format_timestamp, parse_posted_date};
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

/// Wednesday, 2024-03-13 15:30:00 UTC.
fn reference() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 13, 15, 30, 0).unwrap()
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

#[test]
fn compact_hours_are_exact() {
    let now = reference();
    assert_eq!(parse_posted_date("2h", now), Some(now - Duration::hours(2)));
}

#[test]
fn yesterday_is_one_day_back() {
    let now = reference();
    assert_eq!(parse_posted_date("Yesterday", now), Some(now - Duration::days(1)));
    assert_eq!(parse_posted_date("Today", now), Some(now));
}

#[test]
fn garbage_is_absent() {
    let now = reference();
    assert_eq!(parse_posted_date("not a date", now), None);
    assert_eq!(parse_posted_date("", now), None);
    assert_eq!(parse_posted_date("Updated ", now), None);
}

#[test]
fn relative_units_in_priority_order() {
    let now = reference();
    assert_eq!(parse_posted_date("5mo", now), Some(at(2023, 10, 13, 15, 30)));
    assert_eq!(parse_posted_date("2y", now), Some(at(2022, 3, 13, 15, 30)));
    assert_eq!(parse_posted_date("3d", now), Some(at(2024, 3, 10, 15, 30)));
    assert_eq!(parse_posted_date("10m", now), Some(at(2024, 3, 13, 15, 20)));
}

#[test]
fn month_day_in_the_past_keeps_current_year() {
    assert_eq!(parse_posted_date("Jan 5", reference()), Some(at(2024, 1, 5, 0, 0)));
}

#[test]
fn month_day_in_the_future_rolls_back_a_year() {
    assert_eq!(parse_posted_date("Dec 31", reference()), Some(at(2023, 12, 31, 0, 0)));
}

#[test]
fn overflowing_month_day_rolls_forward() {
    assert_eq!(parse_posted_date("Feb 30", reference()), Some(at(2024, 3, 1, 0, 0)));

    let summer_2023 = at(2023, 6, 1, 12, 0);
    assert_eq!(parse_posted_date("Feb 29", summer_2023), Some(at(2023, 3, 1, 0, 0)));

    // Feb 29 2024 is still ahead on Jan 10; a year back it no longer exists.
    let early_2024 = at(2024, 1, 10, 12, 0);
    assert_eq!(parse_posted_date("Feb 29", early_2024), Some(at(2023, 3, 1, 0, 0)));
}

#[test]
fn unknown_month_is_absent() {
    assert_eq!(parse_posted_date("Mon 5", reference()), None);
    assert_eq!(parse_posted_date("Foo 12", reference()), None);
}

#[test]
fn weekday_resolves_to_most_recent_past_occurrence() {
    let now = reference();
    assert_eq!(parse_posted_date("Mon", now), Some(now - Duration::days(2)));
    assert_eq!(parse_posted_date("Thu", now), Some(now - Duration::days(6)));
    // Same weekday as today means last week.
    assert_eq!(parse_posted_date("Wed", now), Some(now - Duration::days(7)));
}

#[test]
fn updated_prefix_is_stripped() {
    let now = reference();
    assert_eq!(parse_posted_date("Updated 4h", now), Some(now - Duration::hours(4)));
    assert_eq!(parse_posted_date("Updated Jan 5", now), Some(at(2024, 1, 5, 0, 0)));
}

#[test]
fn absolute_dates_fall_through() {
    let now = reference();
    assert_eq!(parse_posted_date("May 24, 2021", now), Some(at(2021, 5, 24, 0, 0)));
    assert_eq!(parse_posted_date("2019-07-01", now), Some(at(2019, 7, 1, 0, 0)));
    assert_eq!(
        parse_posted_date("2019-07-01T08:15:00+02:00", now),
        Some(at(2019, 7, 1, 6, 15))
    );
}

#[test]
fn timestamps_are_formatted_with_millis_and_z() {
    assert_eq!(format_timestamp(at(2024, 3, 13, 15, 30)), "2024-03-13T15:30:00.000Z");
}
