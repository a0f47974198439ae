/*
 * date_time.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ritagli, a web application utility toolkit.
 *
 * Ritagli is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ritagli is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ritagli.  If not, see <http://www.gnu.org/licenses/>.
 */

//! RFC 5322 date-time parsing (section 3.3) with the obsolete forms of section 4.3.

use chrono::{DateTime, FixedOffset};

/// Parse a Date header value (e.g. "Fri, 21 Nov 1997 09:55:06 -0600").
/// Trailing comments such as "(PST)" are ignored. Returns None on parse failure.
pub fn parse_rfc5322_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = strip_trailing_comment(value.trim());
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .or_else(|| parse_obsolete_date(value))
}

/// Date of a `Received:` trace header: the text after its last `;`.
pub fn parse_received_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let idx = value.rfind(';')?;
    parse_rfc5322_date(&value[idx + 1..])
}

fn strip_trailing_comment(value: &str) -> &str {
    match value.rfind('(') {
        Some(i) if value.ends_with(')') => value[..i].trim_end(),
        _ => value,
    }
}

/// Obsolete formats: 2-digit year, optional seconds, legacy zone names, no day of week.
fn parse_obsolete_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = match value.find(',') {
        Some(i) => value[i + 1..].trim(),
        None => value,
    };
    let value = convert_obsolete_timezones(&format!("{} ", value));
    let value = convert_two_digit_year(value.trim());
    ["%d %b %Y %H:%M:%S %z", "%d %b %Y %H:%M %z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&value, fmt).ok())
}

/// 2-digit year to 4-digit (00-49 -> 2000-2049, 50-99 -> 1950-1999). Only the token after a month name.
fn convert_two_digit_year(s: &str) -> String {
    const MONTHS: &[&str] = &[
        " Jan ", " Feb ", " Mar ", " Apr ", " May ", " Jun ",
        " Jul ", " Aug ", " Sep ", " Oct ", " Nov ", " Dec ",
    ];
    let mut s = s.to_string();
    for month in MONTHS {
        let Some(i) = s.find(month) else { continue };
        let after = i + month.len();
        let b = s.as_bytes();
        if after + 2 <= b.len()
            && b[after].is_ascii_digit()
            && b[after + 1].is_ascii_digit()
            && (after + 2 == b.len() || !b[after + 2].is_ascii_digit())
        {
            let yy = (b[after] - b'0') as u32 * 10 + (b[after + 1] - b'0') as u32;
            let full = if yy <= 49 { 2000 + yy } else { 1900 + yy };
            s.replace_range(after..after + 2, &full.to_string());
        }
        break;
    }
    s
}

fn convert_obsolete_timezones(s: &str) -> String {
    const ZONES: &[(&str, &str)] = &[
        (" GMT ", " +0000 "),
        (" UT ", " +0000 "),
        (" UTC ", " +0000 "),
        (" Z ", " +0000 "),
        (" EST ", " -0500 "),
        (" EDT ", " -0400 "),
        (" CST ", " -0600 "),
        (" CDT ", " -0500 "),
        (" MST ", " -0700 "),
        (" MDT ", " -0600 "),
        (" PST ", " -0800 "),
        (" PDT ", " -0700 "),
    ];
    let mut s = s.to_string();
    for (zone, offset) in ZONES {
        s = s.replace(zone, offset);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn standard_date() {
        let d = parse_rfc5322_date("Fri, 21 Nov 1997 09:55:06 -0600").unwrap();
        assert_eq!((d.year(), d.month(), d.day(), d.hour()), (1997, 11, 21, 9));
    }

    #[test]
    fn with_comment() {
        assert!(parse_rfc5322_date("Fri, 21 Nov 1997 09:55:06 -0800 (PST)").is_some());
    }

    #[test]
    fn obsolete_forms() {
        let d = parse_rfc5322_date("21 Nov 97 09:55 EST").unwrap();
        assert_eq!(d.year(), 1997);
        assert_eq!(d.offset().local_minus_utc(), -5 * 3600);
        let d = parse_rfc5322_date("Mon, 3 Mar 08 10:00:00 GMT").unwrap();
        assert_eq!(d.year(), 2008);
    }

    #[test]
    fn received_trace() {
        let v = "from mx.example.com (mx [10.0.0.1]) by mail.example.org; Tue, 1 Jul 2003 10:52:37 +0200";
        let d = parse_received_date(v).unwrap();
        assert_eq!(d.minute(), 52);
        assert!(parse_received_date("from a by b").is_none());
    }

    #[test]
    fn garbage() {
        assert!(parse_rfc5322_date("").is_none());
        assert!(parse_rfc5322_date("yesterday").is_none());
    }
}
