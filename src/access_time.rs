use chrono::{DateTime, FixedOffset};

/// Layout of the bracketed access time, e.g. `06/Feb/2019:00:00:38 +0000`.
pub const ACCESS_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Layout used when rendering epoch seconds for humans.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const SECONDS_IN_DAY: u32 = 86_400;

/// Decodes an access-time field.
///
/// Surrounding brackets are optional. Returns `None` when the text does not
/// follow [`ACCESS_TIME_FORMAT`]; the caller decides how to record that.
///
/// # Examples
///
/// ```
/// # use s3slim::access_time::{parse_access_time, to_epoch_seconds};
/// let time = parse_access_time("[06/Feb/2019:00:00:38 +0000]").unwrap();
/// assert_eq!(to_epoch_seconds(&time), 1_549_411_238);
/// assert!(parse_access_time("[not a time]").is_none());
/// ```
pub fn parse_access_time(field: &str) -> Option<DateTime<FixedOffset>> {
    let inner = field.strip_prefix('[').unwrap_or(field);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    DateTime::parse_from_str(inner.trim(), ACCESS_TIME_FORMAT).ok()
}

/// Seconds since the Unix epoch, honouring the zone offset.
///
/// Times that do not fit an unsigned 32-bit value (before 1970 or after
/// early 2106) collapse to `0`, the same value used for unparseable times.
pub fn to_epoch_seconds(time: &DateTime<FixedOffset>) -> u32 {
    u32::try_from(time.timestamp()).unwrap_or(0)
}

/// Renders epoch seconds as `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn format_timestamp(timestamp: u32) -> String {
    match DateTime::from_timestamp(timestamp as i64, 0) {
        Some(time) => time.format(DISPLAY_FORMAT).to_string(),
        None => format!("INVALID_TIME_{timestamp}"),
    }
}

/// Day bucket of a timestamp: whole days since the epoch.
pub fn day_bucket(timestamp: u32) -> u32 {
    timestamp / SECONDS_IN_DAY
}

/// Renders a day bucket as `YYYY-MM-DD`.
pub fn format_day(bucket: u32) -> String {
    let seconds = bucket as i64 * SECONDS_IN_DAY as i64;
    match DateTime::from_timestamp(seconds, 0) {
        Some(time) => time.format("%Y-%m-%d").to_string(),
        None => format!("INVALID_DAY_{bucket}"),
    }
}
