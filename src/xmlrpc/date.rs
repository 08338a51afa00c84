// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! `dateTime.iso8601` rendering and parsing.
//!
//! XML-RPC leaves the exact form loose. The classic form is
//! `19980717T14:08:55`, but servers also send hyphenated dates, fractional
//! seconds and zone designators. Decoding accepts all of those; encoding is
//! driven by [`DateFormatterOptions`].

use std::sync::LazyLock;

use regex::Regex;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::xmlrpc::decoding::ProtocolError;
use crate::xmlrpc::encoding::EncodeError;

static ISO8601: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([0-9]{4})-?([0-9]{2})-?([0-9]{2})T([0-9]{2}):?([0-9]{2}):?([0-9]{2})(?:\.([0-9]+))?(Z|[+-][0-9]{2}(?::?[0-9]{2})?)?$",
    )
    .expect("dateTime.iso8601 pattern")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateFormatterOptions {
    /// Separate time components with colons (`14:08:55`).
    pub colons: bool,
    /// Separate date components with hyphens (`1998-07-17`).
    pub hyphens: bool,
    /// Render, and read zone-less text, in the host's local time instead of UTC.
    pub local: bool,
    /// Emit and read milliseconds.
    pub ms: bool,
    /// Append the zone designator (`Z` or `+hh:mm`).
    pub offset: bool,
}

impl Default for DateFormatterOptions {
    fn default() -> DateFormatterOptions {
        DateFormatterOptions {
            colons: true,
            hyphens: false,
            local: true,
            ms: false,
            offset: false,
        }
    }
}

impl DateFormatterOptions {
    /// UTC with every separator, milliseconds and a `Z` suffix.
    pub fn utc() -> DateFormatterOptions {
        DateFormatterOptions {
            colons: true,
            hyphens: true,
            local: false,
            ms: true,
            offset: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateFormatter {
    options: DateFormatterOptions,
    local_offset: UtcOffset,
}

impl Default for DateFormatter {
    fn default() -> DateFormatter {
        DateFormatter::new(DateFormatterOptions::default())
    }
}

impl DateFormatter {
    /// The host offset is sampled once here; if it cannot be determined UTC
    /// is used.
    pub fn new(options: DateFormatterOptions) -> DateFormatter {
        let local_offset = if options.local {
            UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
        } else {
            UtcOffset::UTC
        };
        DateFormatter::with_local_offset(options, local_offset)
    }

    /// Uses `local_offset` as "local time" instead of asking the host.
    pub fn with_local_offset(options: DateFormatterOptions, local_offset: UtcOffset) -> DateFormatter {
        DateFormatter {
            options,
            local_offset,
        }
    }

    pub fn options(&self) -> &DateFormatterOptions {
        &self.options
    }

    fn zone(&self) -> UtcOffset {
        if self.options.local {
            self.local_offset
        } else {
            UtcOffset::UTC
        }
    }

    pub fn encode(&self, dt: &OffsetDateTime) -> Result<String, EncodeError> {
        let opts = &self.options;
        let zone = self.zone();
        let dt = dt.to_offset(zone);
        if !(0..=9999).contains(&dt.year()) {
            return Err(EncodeError::DateOutOfRange(dt.year()));
        }

        let date_sep = if opts.hyphens { "-" } else { "" };
        let time_sep = if opts.colons { ":" } else { "" };
        let mut out = format!(
            "{:04}{sep}{:02}{sep}{:02}T{:02}{tsep}{:02}{tsep}{:02}",
            dt.year(),
            u8::from(dt.month()),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            sep = date_sep,
            tsep = time_sep,
        );
        if opts.ms {
            out.push_str(&format!(".{:03}", dt.millisecond()));
        }
        if opts.offset {
            if zone.is_utc() {
                out.push('Z');
            } else {
                let sign = if zone.is_negative() { '-' } else { '+' };
                out.push_str(&format!(
                    "{}{:02}{}{:02}",
                    sign,
                    zone.whole_hours().unsigned_abs(),
                    time_sep,
                    zone.minutes_past_hour().unsigned_abs()
                ));
            }
        }
        Ok(out)
    }

    /// Parses wire text. Text without a zone designator is read in the
    /// formatter's zone. Fractional seconds are kept only when `ms` is on.
    pub fn decode(&self, text: &str) -> Result<OffsetDateTime, ProtocolError> {
        let text = text.trim();
        let invalid = || ProtocolError::InvalidDateTime(text.to_string());
        let caps = ISO8601.captures(text).ok_or_else(invalid)?;

        // Every group below is all-ASCII-digits of bounded width.
        let field = |i: usize| -> u32 { caps.get(i).map_or(0, |m| m.as_str().parse().unwrap_or(0)) };

        let month = Month::try_from(field(2) as u8).map_err(|_| invalid())?;
        let date = Date::from_calendar_date(field(1) as i32, month, field(3) as u8)
            .map_err(|_| invalid())?;

        let nanos = match caps.get(7) {
            Some(fraction) if self.options.ms => {
                let digits: String = fraction.as_str().chars().chain("000000000".chars()).take(9).collect();
                digits.parse::<u32>().map_err(|_| invalid())?
            }
            _ => 0,
        };
        let time = Time::from_hms_nano(field(4) as u8, field(5) as u8, field(6) as u8, nanos)
            .map_err(|_| invalid())?;

        let offset = match caps.get(8).map(|m| m.as_str()) {
            None => self.zone(),
            Some("Z") => UtcOffset::UTC,
            Some(designator) => parse_offset(designator).ok_or_else(invalid)?,
        };

        Ok(PrimitiveDateTime::new(date, time).assume_offset(offset))
    }
}

fn parse_offset(designator: &str) -> Option<UtcOffset> {
    let negative = designator.starts_with('-');
    let digits: String = designator[1..].chars().filter(|c| c.is_ascii_digit()).collect();
    let hours: i8 = digits.get(0..2)?.parse().ok()?;
    let minutes: i8 = match digits.get(2..4) {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    let (hours, minutes) = if negative { (-hours, -minutes) } else { (hours, minutes) };
    UtcOffset::from_hms(hours, minutes, 0).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    fn utc(options: DateFormatterOptions) -> DateFormatter {
        DateFormatter::with_local_offset(DateFormatterOptions { local: false, ..options }, UtcOffset::UTC)
    }

    #[test]
    fn test_encode_classic_form() {
        let formatter = utc(DateFormatterOptions::default());
        let dt = datetime!(1998-07-17 14:08:55.750 UTC);
        assert_eq!(formatter.encode(&dt).unwrap(), "19980717T14:08:55");
    }

    #[test]
    fn test_encode_full_form() {
        let formatter = utc(DateFormatterOptions::utc());
        let dt = datetime!(1998-07-17 14:08:55.750 UTC);
        assert_eq!(formatter.encode(&dt).unwrap(), "1998-07-17T14:08:55.750Z");
    }

    #[test]
    fn test_encode_local_offset() {
        let options = DateFormatterOptions { offset: true, ..DateFormatterOptions::default() };
        let formatter = DateFormatter::with_local_offset(options, offset!(+05:30));
        let dt = datetime!(2020-01-01 00:00:00 UTC);
        assert_eq!(formatter.encode(&dt).unwrap(), "20200101T05:30:00+05:30");
        assert_eq!(formatter.decode("20200101T05:30:00+05:30").unwrap(), dt);
        // zone-less text is local time
        assert_eq!(formatter.decode("20200101T05:30:00").unwrap(), dt);
    }

    #[test]
    fn test_decode_variants() {
        let formatter = utc(DateFormatterOptions { ms: true, ..DateFormatterOptions::default() });
        let expected = datetime!(1998-07-17 14:08:55 UTC);
        assert_eq!(formatter.decode("19980717T14:08:55").unwrap(), expected);
        assert_eq!(formatter.decode("1998-07-17T14:08:55Z").unwrap(), expected);
        assert_eq!(formatter.decode("19980717T140855").unwrap(), expected);
        assert_eq!(formatter.decode(" 1998-07-17T16:08:55+02:00\n").unwrap(), expected);
        assert_eq!(formatter.decode("1998-07-17T13:08:55-0100").unwrap(), expected);
        assert_eq!(
            formatter.decode("1998-07-17T14:08:55.25Z").unwrap(),
            datetime!(1998-07-17 14:08:55.250 UTC)
        );
    }

    #[test]
    fn test_decode_rejects_bad_digit_counts() {
        let formatter = utc(DateFormatterOptions::default());
        for text in &[
            "9980717T14:08:55",
            "199807017T14:08:55",
            "19980717T4:08:55",
            "19980717T14:8:55",
            "19980717 14:08:55",
            "19981317T14:08:55",
            "19980732T14:08:55",
            "19980717T25:08:55",
            "",
        ] {
            match formatter.decode(text) {
                Err(ProtocolError::InvalidDateTime(_)) => {}
                other => panic!("{:?} decoded to {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_millisecond_round_trip() {
        let formatter = utc(DateFormatterOptions::utc());
        let dt = datetime!(2024-02-29 23:59:59.123 UTC);
        let text = formatter.encode(&dt).unwrap();
        assert_eq!(formatter.decode(&text).unwrap(), dt);
    }

    #[test]
    fn test_precision_disabled_drops_subseconds() {
        let formatter = utc(DateFormatterOptions { ms: false, ..DateFormatterOptions::utc() });
        let dt = datetime!(2024-02-29 23:59:59.987 UTC);
        let text = formatter.encode(&dt).unwrap();
        assert_eq!(text, "2024-02-29T23:59:59Z");
        assert_eq!(formatter.decode(&text).unwrap(), datetime!(2024-02-29 23:59:59 UTC));
        assert_eq!(
            formatter.decode("2024-02-29T23:59:59.987Z").unwrap(),
            datetime!(2024-02-29 23:59:59 UTC)
        );
    }

    #[test]
    fn test_year_out_of_range() {
        let formatter = utc(DateFormatterOptions::default());
        let dt = Date::from_calendar_date(-1, Month::January, 1)
            .unwrap()
            .midnight()
            .assume_utc();
        match formatter.encode(&dt) {
            Err(EncodeError::DateOutOfRange(-1)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
