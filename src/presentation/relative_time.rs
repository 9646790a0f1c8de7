//! "5 minutes ago" style timestamps.
//!
//! Units switch at the same points as the dayjs `relativeTime` plugin so the
//! feed reads the same as a client-rendered one.

use time::OffsetDateTime;

const SECS_PER_MINUTE: f64 = 60.0;
const SECS_PER_HOUR: f64 = 3_600.0;
const SECS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_MONTH: f64 = 30.436_875;
const DAYS_PER_YEAR: f64 = 365.242_5;

/// Describe how long before `now` the instant `then` was. Future instants
/// read as "a few seconds ago".
pub fn relative_time(then: OffsetDateTime, now: OffsetDateTime) -> String {
    let secs = (now - then).as_seconds_f64().max(0.0);

    if secs.round() <= 44.0 {
        return "a few seconds ago".to_string();
    }
    if secs.round() <= 89.0 {
        return "a minute ago".to_string();
    }

    let minutes = (secs / SECS_PER_MINUTE).round();
    if minutes <= 44.0 {
        return format!("{} minutes ago", minutes as i64);
    }
    if minutes <= 89.0 {
        return "an hour ago".to_string();
    }

    let hours = (secs / SECS_PER_HOUR).round();
    if hours <= 21.0 {
        return format!("{} hours ago", hours as i64);
    }
    if hours <= 35.0 {
        return "a day ago".to_string();
    }

    let days = (secs / SECS_PER_DAY).round();
    if days <= 25.0 {
        return format!("{} days ago", days as i64);
    }
    if days <= 45.0 {
        return "a month ago".to_string();
    }

    let months = (secs / SECS_PER_DAY / DAYS_PER_MONTH).round();
    if months <= 10.0 {
        return format!("{} months ago", months as i64);
    }
    if months <= 17.0 {
        return "a year ago".to_string();
    }

    let years = (secs / SECS_PER_DAY / DAYS_PER_YEAR).round().max(2.0);
    format!("{} years ago", years as i64)
}
