use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Utc};

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Random document id (uuid v4, simple form)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Strip everything but digits: `010-1234-5678` → `01012345678`
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Display form of a stored phone number.
///
/// 11 digits → 3-4-4, 10 digits → 3-3-4, anything else unchanged.
pub fn format_phone(phone: &str) -> String {
    let digits = normalize_phone(phone);
    match digits.len() {
        11 => format!("{}-{}-{}", &digits[..3], &digits[3..7], &digits[7..]),
        10 => format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        _ => phone.to_string(),
    }
}

/// Calendar day at 00:00 UTC, in epoch millis
pub fn day_millis(date: NaiveDate) -> i64 {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
        .timestamp_millis()
}

/// Day + wall clock time, in epoch millis
pub fn day_time_millis(date: NaiveDate, hour: u32, minute: u32) -> Option<i64> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(Utc.from_utc_datetime(&date.and_time(time)).timestamp_millis())
}

/// Calendar day of an epoch-millis instant
pub fn millis_to_date(millis: i64) -> Option<NaiveDate> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.date_naive())
}

/// `[first day 00:00, last day 00:00]` of the month containing `date`
pub fn month_bounds(date: NaiveDate) -> Option<(i64, i64)> {
    let first = date.with_day(1)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
    };
    let last = next.pred_opt()?;
    Some((day_millis(first), day_millis(last)))
}
