use chrono::{DateTime, Utc};

/*-------------------------------------------------------------------------------------------------
  HTTP DateTime Format
-------------------------------------------------------------------------------------------------*/

// RFC 1123 as used by the HTTP `Last-Modified` header, e.g. `Mon, 02 Jan 2006 15:04:05 GMT`.
const HTTP_DATETIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Parse an HTTP `Last-Modified` value into seconds since the Unix epoch.
pub fn parse_http_date(value: &str) -> Result<i64, chrono::ParseError> {
    DateTime::parse_from_rfc2822(value.trim()).map(|date_time| date_time.timestamp())
}

/// Format seconds since the Unix epoch as an HTTP date; `0` (never fetched) and out-of-range
/// values are rendered as `never`.
pub fn format_http_date(timestamp: i64) -> String {
    match DateTime::<Utc>::from_timestamp(timestamp, 0) {
        Some(date_time) if timestamp != 0 => date_time.format(HTTP_DATETIME_FORMAT).to_string(),
        _ => "never".to_string(),
    }
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
