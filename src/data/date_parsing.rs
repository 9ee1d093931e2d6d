//! Date parsing strategies
//!
//! Values are tried against an ordered list of formats and the first one
//! that parses wins. ISO-8601 offset date-times come first; the legacy
//! `dd/MM/yyyy hh:mm:ss a` format is interpreted as UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// One way of turning a string into an instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateParser {
    /// `2021-01-01T00:00:00+00:00`, `2021-01-01T00:00Z`
    IsoOffset,
    /// `31/12/2021 11:30:00 PM`
    Legacy,
}

const LEGACY_FORMAT: &str = "%d/%m/%Y %I:%M:%S %p";
const ISO_MINUTES_FORMAT: &str = "%Y-%m-%dT%H:%M%:z";

/// Strategies tried when reading a cell under a date filter
pub const ROW_VALUE_PARSERS: &[DateParser] = &[DateParser::IsoOffset, DateParser::Legacy];

impl DateParser {
    pub fn parse(&self, value: &str) -> Option<DateTime<FixedOffset>> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        match self {
            DateParser::IsoOffset => DateTime::parse_from_rfc3339(value)
                .or_else(|_| DateTime::parse_from_str(value, ISO_MINUTES_FORMAT))
                .ok()
                .or_else(|| {
                    // minute precision with a 'Z' designator
                    value
                        .strip_suffix('Z')
                        .and_then(|v| {
                            NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M").ok()
                        })
                        .map(|naive| Utc.from_utc_datetime(&naive).into())
                }),
            DateParser::Legacy => NaiveDateTime::parse_from_str(value, LEGACY_FORMAT)
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive).into()),
        }
    }
}

/// True when the value is an ISO-8601 offset date-time
pub fn is_iso_offset_date_time(value: &str) -> bool {
    DateParser::IsoOffset.parse(value).is_some()
}

/// Parse with the first strategy that accepts the value
pub fn parse_with(parsers: &[DateParser], value: &str) -> Option<DateTime<FixedOffset>> {
    parsers.iter().find_map(|parser| parser.parse(value))
}

/// Render an instant in ISO-8601 offset form
pub fn to_iso_string(instant: &DateTime<FixedOffset>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Re-render any accepted date as ISO-8601, e.g. a legacy cell
pub fn normalize_to_iso(value: &str) -> Option<String> {
    parse_with(ROW_VALUE_PARSERS, value).map(|instant| to_iso_string(&instant))
}
