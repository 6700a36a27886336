use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// `YYYY-MM` key of the month containing `date`.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// First weekday of the month: the 1st, pushed to Monday when it falls on a weekend.
pub fn first_business_day(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let shift = match first.weekday() {
        Weekday::Sat => 2,
        Weekday::Sun => 1,
        _ => 0,
    };
    Some(first + Duration::days(shift))
}
