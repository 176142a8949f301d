//! Calendar Timestamps
//!
//! Tokenizer and formatter for the `xs:dateTime`, `xs:date` and `xs:time`
//! lexical forms:
//!
//! ```text
//! YYYY-MM-DDThh:mm:ss[.fff](+|-)hh:mm
//! YYYY-MM-DD(+|-)hh:mm
//! hh:mm:ss[.fff](+|-)hh:mm
//! ```
//!
//! Parsing walks the text once, left to right, cutting a token at each expected
//! delimiter and converting it with permissive decimal parsing. Nothing ever
//! fails: empty or malformed tokens become 0 and the result is tagged
//! [`Lexical::Defaulted`]. A trailing `Z` means UTC. Fractional seconds are
//! truncated, so formatting always emits `.000`.
//!
//! The sign of a `(+|-)hh:mm` offset belongs to the hours token by default, so
//! `-03:30` is `(-3 * 60 + 30) * 60` seconds. [`OffsetSign::Whole`] reads it
//! the way other schema processors do. Formatting inverts whichever rule is
//! chosen.

use crate::lexical::{parse_double, parse_integer, Lexical};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike};
use std::fmt::Write;

/// How the sign of a `(+|-)hh:mm` offset is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OffsetSign {
    /// The sign belongs to the hours only: `(±hh * 60 + mm) * 60`.
    ///
    /// Matches the legacy runtime, so `-03:30` is -9000 seconds and a negative
    /// half-hour zone is written with the hour rounded down (`-03:30` again).
    #[default]
    Hours,
    /// The sign covers the whole offset: `±(hh * 60 + mm) * 60`.
    Whole,
}

/// A broken-down calendar timestamp with a fixed UTC offset.
///
/// Fields not present in the lexical form they were read from are 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CalendarTimestamp {
    /// Full year, e.g. 2009
    pub year: i32,
    /// Month of year, 1-12
    pub month: u32,
    /// Day of month, 1-31
    pub day: u32,
    /// Hour of day, 0-23
    pub hour: u32,
    /// Minute of hour, 0-59
    pub minute: u32,
    /// Second of minute, 0-61 (leap seconds)
    pub second: u32,
    /// Offset from UTC in seconds, east positive
    pub offset_seconds: i32,
}

impl CalendarTimestamp {
    /// A date-only timestamp at UTC.
    pub fn date(year: i32, month: u32, day: u32) -> Self {
        CalendarTimestamp {
            year,
            month,
            day,
            ..Default::default()
        }
    }

    /// A time-only timestamp at UTC.
    pub fn time(hour: u32, minute: u32, second: u32) -> Self {
        CalendarTimestamp {
            hour,
            minute,
            second,
            ..Default::default()
        }
    }

    /// A full date and time at UTC.
    pub fn date_time(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        CalendarTimestamp {
            year,
            month,
            day,
            hour,
            minute,
            second,
            offset_seconds: 0,
        }
    }

    /// Replace the UTC offset.
    pub fn with_offset(mut self, offset_seconds: i32) -> Self {
        self.offset_seconds = offset_seconds;
        self
    }

    /// Convert to a chrono timestamp, if every field is in range.
    ///
    /// Second 60 maps to chrono's leap-second representation; second 61 has none.
    pub fn to_chrono(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.offset_seconds)?;
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day)?;
        let naive = match self.second {
            60 => date.and_hms_nano_opt(self.hour, self.minute, 59, 1_000_000_000)?,
            s => date.and_hms_opt(self.hour, self.minute, s)?,
        };
        naive.and_local_timezone(offset).single()
    }
}

impl From<DateTime<FixedOffset>> for CalendarTimestamp {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        let leap = u32::from(dt.nanosecond() >= 1_000_000_000);
        CalendarTimestamp {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second() + leap,
            offset_seconds: dt.offset().local_minus_utc(),
        }
    }
}

/// Left-to-right delimiter scanner over one lexical value.
struct Tokens<'a> {
    text: &'a str,
    pos: usize,
    well_formed: bool,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Tokens {
            text,
            pos: 0,
            well_formed: true,
        }
    }

    /// Cut the next token at the first of `delims`, consuming the delimiter.
    fn until(&mut self, delims: &[u8]) -> &'a str {
        let token = self.peek_until(delims);
        self.pos += token.len();
        if self.pos < self.text.len() {
            self.pos += 1;
        }
        token
    }

    /// Cut the next token at the first of `delims`, leaving the delimiter.
    fn peek_until(&self, delims: &[u8]) -> &'a str {
        let rest = &self.text[self.pos..];
        let len = rest
            .bytes()
            .position(|b| delims.contains(&b))
            .unwrap_or(rest.len());
        &rest[..len]
    }

    /// Everything not yet consumed.
    fn rest(&mut self) -> &'a str {
        let rest = &self.text[self.pos..];
        self.pos = self.text.len();
        rest
    }

    /// Consume a sign character. Anything else counts as `+`.
    fn sign(&mut self) -> Option<i32> {
        match self.text.as_bytes().get(self.pos) {
            Some(b'+') => {
                self.pos += 1;
                Some(1)
            }
            Some(b'-') => {
                self.pos += 1;
                Some(-1)
            }
            _ => None,
        }
    }

    fn integer(&mut self, token: &str) -> i64 {
        let parsed = parse_integer(token);
        self.well_formed &= parsed.is_parsed();
        parsed.value()
    }

    fn field(&mut self, token: &str, min: u32, max: u32) -> u32 {
        let value = self.integer(token);
        self.bounded(value, min, max)
    }

    fn seconds(&mut self, token: &str) -> u32 {
        let parsed = parse_double(token);
        self.well_formed &= parsed.is_parsed();
        let value = parsed.value();
        let whole = if value.is_finite() { value.trunc() as i64 } else { 0 };
        self.bounded(whole, 0, 61)
    }

    fn bounded(&mut self, value: i64, min: u32, max: u32) -> u32 {
        if value < 0 {
            self.well_formed = false;
            return 0;
        }
        let value = u32::try_from(value).unwrap_or(u32::MAX);
        if value < min || value > max {
            self.well_formed = false;
        }
        value
    }

    /// Parse the `(+|-)hh:mm` tail, or accept its absence.
    fn offset(&mut self, rule: OffsetSign) -> i32 {
        let Some(sign) = self.sign() else {
            let rest = self.rest();
            if !rest.is_empty() {
                self.well_formed = false;
            }
            return 0;
        };
        let hours_token = self.until(b":");
        let minutes_token = self.rest();
        let hours = self.field(hours_token, 0, 14);
        let minutes = self.field(minutes_token, 0, 59);
        let (hours, minutes) = (i64::from(hours), i64::from(minutes));
        let total = match rule {
            OffsetSign::Hours => (i64::from(sign) * hours * 60 + minutes) * 60,
            OffsetSign::Whole => i64::from(sign) * (hours * 60 + minutes) * 60,
        };
        i32::try_from(total).unwrap_or(0)
    }

    fn finish(self, value: CalendarTimestamp) -> Lexical<CalendarTimestamp> {
        Lexical::new(value, self.well_formed)
    }
}

/// Strip a trailing `Z` designator, reporting whether it was there.
fn split_zulu(text: &str) -> (&str, bool) {
    let text = text.trim();
    match text.strip_suffix('Z') {
        Some(stripped) => (stripped, true),
        None => (text, false),
    }
}

fn year(tokens: &mut Tokens<'_>, token: &str) -> i32 {
    let value = tokens.integer(token);
    match i32::try_from(value) {
        Ok(y) => y,
        Err(_) => {
            tokens.well_formed = false;
            0
        }
    }
}

/// Parse `YYYY-MM-DDThh:mm:ss[.fff](+|-)hh:mm`.
pub fn parse_date_time(text: &str) -> Lexical<CalendarTimestamp> {
    parse_date_time_with(text, OffsetSign::default())
}

/// [`parse_date_time`] with an explicit offset sign rule.
pub fn parse_date_time_with(text: &str, rule: OffsetSign) -> Lexical<CalendarTimestamp> {
    let (body, zulu) = split_zulu(text);
    let mut tokens = Tokens::new(body);

    let year_token = tokens.until(b"-");
    let month_token = tokens.until(b"-");
    let day_token = tokens.until(b"T");
    let hour_token = tokens.until(b":");
    let minute_token = tokens.until(b":");
    let second_token = tokens.peek_until(b"+-");
    tokens.pos += second_token.len();

    let mut ts = CalendarTimestamp {
        year: year(&mut tokens, year_token),
        month: tokens.field(month_token, 1, 12),
        day: tokens.field(day_token, 1, 31),
        hour: tokens.field(hour_token, 0, 23),
        minute: tokens.field(minute_token, 0, 59),
        second: tokens.seconds(second_token),
        offset_seconds: 0,
    };
    ts.offset_seconds = tokens.offset(rule);
    if zulu && ts.offset_seconds != 0 {
        tokens.well_formed = false;
    }
    tokens.finish(ts)
}

/// Parse `YYYY-MM-DD(+|-)hh:mm`. Time-of-day fields are 0.
pub fn parse_date(text: &str) -> Lexical<CalendarTimestamp> {
    parse_date_with(text, OffsetSign::default())
}

/// [`parse_date`] with an explicit offset sign rule.
pub fn parse_date_with(text: &str, rule: OffsetSign) -> Lexical<CalendarTimestamp> {
    let (body, zulu) = split_zulu(text);
    let mut tokens = Tokens::new(body);

    let year_token = tokens.until(b"-");
    let month_token = tokens.until(b"-");
    let day_token = tokens.peek_until(b"+-");
    tokens.pos += day_token.len();

    let mut ts = CalendarTimestamp {
        year: year(&mut tokens, year_token),
        month: tokens.field(month_token, 1, 12),
        day: tokens.field(day_token, 1, 31),
        ..Default::default()
    };
    ts.offset_seconds = tokens.offset(rule);
    if zulu && ts.offset_seconds != 0 {
        tokens.well_formed = false;
    }
    tokens.finish(ts)
}

/// Parse `hh:mm:ss[.fff](+|-)hh:mm`. Date fields are 0.
pub fn parse_time(text: &str) -> Lexical<CalendarTimestamp> {
    parse_time_with(text, OffsetSign::default())
}

/// [`parse_time`] with an explicit offset sign rule.
pub fn parse_time_with(text: &str, rule: OffsetSign) -> Lexical<CalendarTimestamp> {
    let (body, zulu) = split_zulu(text);
    let mut tokens = Tokens::new(body);

    let hour_token = tokens.until(b":");
    let minute_token = tokens.until(b":");
    let second_token = tokens.peek_until(b"+-");
    tokens.pos += second_token.len();

    let mut ts = CalendarTimestamp {
        hour: tokens.field(hour_token, 0, 23),
        minute: tokens.field(minute_token, 0, 59),
        second: tokens.seconds(second_token),
        ..Default::default()
    };
    ts.offset_seconds = tokens.offset(rule);
    if zulu && ts.offset_seconds != 0 {
        tokens.well_formed = false;
    }
    tokens.finish(ts)
}

fn push_offset(out: &mut String, offset_seconds: i32, rule: OffsetSign) {
    let (sign, hours, minutes) = match rule {
        OffsetSign::Hours => {
            let total = offset_seconds.div_euclid(60);
            let hours = total.div_euclid(60);
            let sign = if hours < 0 { '-' } else { '+' };
            (sign, hours.unsigned_abs(), total.rem_euclid(60).unsigned_abs())
        }
        OffsetSign::Whole => {
            let sign = if offset_seconds < 0 { '-' } else { '+' };
            let abs = offset_seconds.unsigned_abs();
            (sign, abs / 3600, (abs / 60) % 60)
        }
    };
    let _ = write!(out, "{sign}{hours:02}:{minutes:02}");
}

/// Format as `YYYY-MM-DDThh:mm:ss.000±hh:mm`.
pub fn format_date_time(ts: &CalendarTimestamp) -> String {
    format_date_time_with(ts, OffsetSign::default())
}

/// [`format_date_time`] with an explicit offset sign rule.
pub fn format_date_time_with(ts: &CalendarTimestamp, rule: OffsetSign) -> String {
    let mut out = String::with_capacity(29);
    let _ = write!(
        out,
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.000",
        ts.year, ts.month, ts.day, ts.hour, ts.minute, ts.second
    );
    push_offset(&mut out, ts.offset_seconds, rule);
    out
}

/// Format as `YYYY-MM-DD±hh:mm`.
pub fn format_date(ts: &CalendarTimestamp) -> String {
    format_date_with(ts, OffsetSign::default())
}

/// [`format_date`] with an explicit offset sign rule.
pub fn format_date_with(ts: &CalendarTimestamp, rule: OffsetSign) -> String {
    let mut out = String::with_capacity(16);
    let _ = write!(out, "{:04}-{:02}-{:02}", ts.year, ts.month, ts.day);
    push_offset(&mut out, ts.offset_seconds, rule);
    out
}

/// Format as `hh:mm:ss.000±hh:mm`.
pub fn format_time(ts: &CalendarTimestamp) -> String {
    format_time_with(ts, OffsetSign::default())
}

/// [`format_time`] with an explicit offset sign rule.
pub fn format_time_with(ts: &CalendarTimestamp, rule: OffsetSign) -> String {
    let mut out = String::with_capacity(18);
    let _ = write!(out, "{:02}:{:02}:{:02}.000", ts.hour, ts.minute, ts.second);
    push_offset(&mut out, ts.offset_seconds, rule);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_time_without_offset() {
        let parsed = parse_date_time("2007-01-01T12:12:12");
        assert!(parsed.is_parsed());
        assert_eq!(parsed.value(), CalendarTimestamp::date_time(2007, 1, 1, 12, 12, 12));
    }

    #[test]
    fn test_date_time_with_fraction_and_negative_offset() {
        let parsed = parse_date_time("2009-08-04T10:11:38.428-06:00");
        assert!(parsed.is_parsed());
        let ts = parsed.value();
        assert_eq!((ts.year, ts.month, ts.day), (2009, 8, 4));
        assert_eq!((ts.hour, ts.minute, ts.second), (10, 11, 38));
        assert_eq!(ts.offset_seconds, -21600);
    }

    #[test]
    fn test_date_only() {
        let parsed = parse_date("2007-01-01");
        assert!(parsed.is_parsed());
        assert_eq!(parsed.value(), CalendarTimestamp::date(2007, 1, 1));
    }

    #[test]
    fn test_date_with_offset() {
        let ts = parse_date("2007-01-31-05:00").value();
        assert_eq!(ts, CalendarTimestamp::date(2007, 1, 31).with_offset(-18000));
    }

    #[test]
    fn test_time_only() {
        let parsed = parse_time("12:20:30");
        assert!(parsed.is_parsed());
        assert_eq!(parsed.value(), CalendarTimestamp::time(12, 20, 30));
    }

    #[test]
    fn test_time_with_positive_offset() {
        let ts = parse_time("23:59:60.5+05:30").value();
        assert_eq!(ts.second, 60);
        assert_eq!(ts.offset_seconds, 19800);
    }

    #[test]
    fn test_zulu_designator() {
        let parsed = parse_date_time("2020-02-29T00:00:00Z");
        assert!(parsed.is_parsed());
        assert_eq!(parsed.value().offset_seconds, 0);
    }

    #[test]
    fn test_negative_half_hour_offset_signs_hours_only() {
        let parsed = parse_time("01:00:00-03:30");
        assert!(parsed.is_parsed());
        let ts = parsed.value();
        assert_eq!(ts.offset_seconds, (-3 * 60 + 30) * 60);
        assert_eq!(format_time(&ts), "01:00:00.000-03:30");

        assert_eq!(parse_date("2007-01-31-09:30").value().offset_seconds, (-9 * 60 + 30) * 60);
        // An unsigned zero hour leaves the minutes positive
        assert_eq!(parse_time("00:00:00-00:30").value().offset_seconds, 1800);
        assert_eq!(parse_time("01:00:00+03:30").value().offset_seconds, 12600);
    }

    #[test]
    fn test_negative_half_hour_offset_signs_whole_offset() {
        let ts = parse_time_with("01:00:00-03:30", OffsetSign::Whole).value();
        assert_eq!(ts.offset_seconds, -(3 * 3600 + 30 * 60));
        assert_eq!(format_time_with(&ts, OffsetSign::Whole), "01:00:00.000-03:30");
        assert_eq!(format_time(&ts), "01:00:00.000-04:30");

        let ts = parse_date_time_with("2009-08-04T10:11:38+05:30", OffsetSign::Whole).value();
        assert_eq!(ts.offset_seconds, 19800);
    }

    #[test]
    fn test_offset_rules_agree_on_whole_hours() {
        for text in ["10:00:00-06:00", "10:00:00+02:00", "10:00:00+00:00"] {
            let hours = parse_time_with(text, OffsetSign::Hours).value();
            let whole = parse_time_with(text, OffsetSign::Whole).value();
            assert_eq!(hours, whole);
            assert_eq!(format_time_with(&hours, OffsetSign::Hours), format_time_with(&whole, OffsetSign::Whole));
        }
    }

    #[test]
    fn test_hours_rule_round_trips_every_quarter_hour() {
        for quarter in -56..=56 {
            let ts = CalendarTimestamp::time(0, 0, 0).with_offset(quarter * 900);
            let text = format_time(&ts);
            assert_eq!(parse_time(&text).value(), ts, "{text}");
        }
    }

    #[test]
    fn test_garbage_defaults_to_zero() {
        let parsed = parse_date_time("not a timestamp");
        assert!(parsed.is_defaulted());
        assert_eq!(parsed.value(), CalendarTimestamp::default());

        let parsed = parse_date_time("");
        assert!(parsed.is_defaulted());
        assert_eq!(parsed.value(), CalendarTimestamp::default());
    }

    #[test]
    fn test_empty_tokens_decode_to_zero() {
        let parsed = parse_date_time("2007--01T::");
        assert!(parsed.is_defaulted());
        let ts = parsed.value();
        assert_eq!(ts.year, 2007);
        assert_eq!(ts.month, 0);
        assert_eq!(ts.day, 1);
        assert_eq!((ts.hour, ts.minute, ts.second), (0, 0, 0));
    }

    #[test]
    fn test_out_of_range_is_defaulted_but_kept() {
        let parsed = parse_date("2007-13-01");
        assert!(parsed.is_defaulted());
        assert_eq!(parsed.value().month, 13);
    }

    #[test]
    fn test_malformed_sign_counts_as_plus() {
        let parsed = parse_time("10:00:00~02:00");
        assert!(parsed.is_defaulted());
        assert_eq!(parsed.value().offset_seconds, 0);
    }

    #[test]
    fn test_formatters() {
        let ts = CalendarTimestamp::date_time(2009, 8, 4, 10, 11, 38).with_offset(-21600);
        assert_eq!(format_date_time(&ts), "2009-08-04T10:11:38.000-06:00");
        assert_eq!(format_date(&ts), "2009-08-04-06:00");
        assert_eq!(format_time(&ts), "10:11:38.000-06:00");
        assert_eq!(format_date(&CalendarTimestamp::date(7, 1, 2)), "0007-01-02+00:00");
    }

    #[test]
    fn test_format_parse_round_trip_drops_fraction() {
        let original = parse_date_time("2009-08-04T10:11:38.428+02:00").value();
        let reparsed = parse_date_time(&format_date_time(&original));
        assert!(reparsed.is_parsed());
        assert_eq!(reparsed.value(), original);
    }

    #[test]
    fn test_chrono_conversion() {
        let ts = CalendarTimestamp::date_time(2009, 8, 4, 10, 11, 38).with_offset(-21600);
        let dt = ts.to_chrono().unwrap();
        assert_eq!(dt.to_rfc3339(), "2009-08-04T10:11:38-06:00");
        assert_eq!(CalendarTimestamp::from(dt), ts);

        assert!(CalendarTimestamp::time(1, 2, 3).to_chrono().is_none());
    }

    use proptest::prelude::*;

    fn offset_rule() -> impl Strategy<Value = OffsetSign> {
        prop_oneof![Just(OffsetSign::Hours), Just(OffsetSign::Whole)]
    }

    proptest! {
        #[test]
        fn test_format_parse_round_trip(
            year in 0i32..=9999,
            month in 1u32..=12,
            day in 1u32..=28,
            hour in 0u32..24,
            minute in 0u32..60,
            second in 0u32..60,
            quarter in -56i32..=56,
            rule in offset_rule(),
        ) {
            let ts = CalendarTimestamp::date_time(year, month, day, hour, minute, second).with_offset(quarter * 900);
            let parsed = parse_date_time_with(&format_date_time_with(&ts, rule), rule);
            prop_assert!(parsed.is_parsed());
            prop_assert_eq!(parsed.value(), ts);
        }
    }
}
