use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d-%m-%Y"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse date `{0}`: use YYYY-MM-DD or DD-MM-YYYY")]
pub struct DateParseError(pub String);

/// Parse a calendar date in `YYYY-MM-DD` or `DD-MM-YYYY` form.
/// RFC 3339 timestamps are also accepted; the date is taken in UTC.
pub fn parse_date(raw: &str) -> Result<NaiveDate, DateParseError> {
    let s = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc).date_naive());
    }
    Err(DateParseError(raw.to_string()))
}

/// Parse an optional config date. Absent and blank both mean "not set".
pub fn parse_optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>, DateParseError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date(s).map(Some),
    }
}
