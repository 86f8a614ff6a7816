use chrono::{Datelike, NaiveDate, NaiveTime};

/// `NaiveDate::num_days_from_ce()` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Fast parse of a date cell.
///
/// Accepts `YYYY-MM-DD` and `YYYY/MM/DD`, optionally followed by a
/// ` HH:MM:SS` or `THH:MM:SS` time part which is validated and dropped.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // minimal length + separators check
    if s.len() < 10 || !s.is_char_boundary(10) {
        return None;
    }
    let (date, rest) = s.split_at(10);
    let fmt = match (date.as_bytes()[4], date.as_bytes()[7]) {
        (b'-', b'-') => "%Y-%m-%d",
        (b'/', b'/') => "%Y/%m/%d",
        _ => return None,
    };
    let parsed = NaiveDate::parse_from_str(date, fmt).ok()?;

    if rest.is_empty() {
        return Some(parsed);
    }
    let time = rest.strip_prefix(' ').or_else(|| rest.strip_prefix('T'))?;
    NaiveTime::parse_from_str(time, "%H:%M:%S%.f").ok()?;
    Some(parsed)
}

/// Arrow `Date32` representation: days since 1970-01-01.
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}
