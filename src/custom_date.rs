use chrono::format::strftime::StrftimeItems;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::FeedError;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub fn format_rfc822(datetime: DateTime<Utc>) -> String {
    let format = StrftimeItems::new("%a, %d %b %Y %H:%M:%S %z");
    datetime.format_with_items(format).to_string()
}

/// Label shown for a calendar event, in the calendar's own zone.
pub fn format_event_date(datetime: DateTime<Utc>, tz: Tz) -> String {
    datetime
        .with_timezone(&tz)
        .format("%a, %d %b %Y %H:%M")
        .to_string()
}

/// Timestamps from the JSON APIs are RFC 3339.
pub fn parse_timestamp(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(date_str.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parses the start date of a calendar entry. Feeds disagree on the format, so
/// zoned forms are tried first and zone-less ones are read in `tz`.
pub fn parse_event_date(date_str: &str, tz: Tz) -> Result<DateTime<Utc>, FeedError> {
    let date_str = date_str.trim().trim_matches('"');
    if date_str.is_empty() {
        return Err(FeedError::parse("empty date"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date_str, fmt).ok())
        .or_else(|| parse_date_only(date_str));

    match naive {
        Some(naive) => localize(naive, tz),
        None => Err(FeedError::parse(format!("unrecognized date: {date_str}"))),
    }
}

fn parse_date_only(date_str: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, FeedError> {
    // DST gaps have no local mapping; overlaps take the earlier instant.
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| FeedError::parse(format!("nonexistent local time: {naive}")))
}
