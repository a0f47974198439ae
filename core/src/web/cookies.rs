/*
 * cookies.rs
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

//! Cookie header helpers: request `Cookie:` lookup, `Set-Cookie` parsing, request header formatting.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::charset::Charset;
use crate::web::urlencode;

/// Split a request `Cookie:` header into (name, value) pairs, in order.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
            None => (part.to_string(), String::new()),
        })
        .collect()
}

/// Value of cookie `name`, URL-decoded in `encoding`.
/// `default` is returned when the header or cookie is missing, the encoding is unknown,
/// or the value is not valid URL encoding.
pub fn get_cookie(cookie_header: Option<&str>, name: &str, default: &str, encoding: &str) -> String {
    let Some(header) = cookie_header else {
        return default.to_string();
    };
    let Some(charset) = Charset::from_label(encoding) else {
        tracing::warn!(encoding, "unsupported cookie encoding");
        return default.to_string();
    };
    parse_cookie_header(header)
        .into_iter()
        .find(|(k, _)| k == name)
        .and_then(|(_, v)| urlencode::decode(&v, charset))
        .unwrap_or_else(|| default.to_string())
}

/// Parse an `expires` attribute value. Unknown formats give None.
fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    // Netscape form: Wed, 09-Jun-2021 10:18:14 GMT
    if let Some((stamp, _zone)) = value.rsplit_once(' ') {
        for fmt in ["%a, %d-%b-%Y %H:%M:%S", "%a, %d %b %Y %H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(stamp, fmt) {
                return Some(dt.and_utc());
            }
        }
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse one `Set-Cookie` value into (name, value).
///
/// Returns None when the attribute after the pair is an expiry at or before `now`.
/// An expiry that cannot be parsed keeps the cookie.
pub fn parse_set_cookie(value: &str, now: DateTime<Utc>) -> Option<(String, String)> {
    let mut parts = value.split("; ");
    let first = parts.next().unwrap_or("");
    let (name, val) = first.split_once('=').unwrap_or((first, ""));
    if let Some(attr) = parts.next() {
        if let Some((key, when)) = attr.split_once('=') {
            if key.trim().eq_ignore_ascii_case("expires") {
                match parse_expires(when) {
                    Some(expires) if expires <= now => return None,
                    Some(_) => {}
                    None => tracing::warn!(value = when, "unparseable cookie expiry"),
                }
            }
        }
    }
    Some((name.to_string(), val.to_string()))
}

/// Request header form: `k=v; ` for each cookie.
pub fn format_cookie_header<'a, I>(cookies: I) -> String
where
    I: IntoIterator<Item = &'a (String, String)>,
{
    cookies
        .into_iter()
        .map(|(k, v)| format!("{}={}; ", k, v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn finds_and_decodes_cookie() {
        let header = "lang=es; user=Jos%E9+Mar%EDa; empty";
        assert_eq!(get_cookie(Some(header), "user", "-", "ISO-8859-1"), "José María");
        assert_eq!(get_cookie(Some(header), "lang", "-", "UTF-8"), "es");
        assert_eq!(get_cookie(Some(header), "empty", "-", "UTF-8"), "");
    }

    #[test]
    fn default_when_missing_or_undecodable() {
        assert_eq!(get_cookie(None, "a", "dflt", "UTF-8"), "dflt");
        assert_eq!(get_cookie(Some("b=1"), "a", "dflt", "UTF-8"), "dflt");
        assert_eq!(get_cookie(Some("a=%G1"), "a", "dflt", "UTF-8"), "dflt");
        assert_eq!(get_cookie(Some("a=1"), "a", "dflt", "EBCDIC"), "dflt");
    }

    #[test]
    fn expired_set_cookie_is_dropped() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(
            parse_set_cookie("sid=abc; expires=Wed, 01-Jan-2020 00:00:00 GMT; path=/", now),
            None
        );
        assert_eq!(
            parse_set_cookie("sid=abc; expires=Fri, 01 Jan 2100 00:00:00 GMT", now),
            Some(("sid".to_string(), "abc".to_string()))
        );
    }

    #[test]
    fn bad_expiry_or_other_attribute_keeps_cookie() {
        let now = Utc::now();
        assert_eq!(
            parse_set_cookie("sid=abc; expires=someday", now),
            Some(("sid".to_string(), "abc".to_string()))
        );
        assert_eq!(
            parse_set_cookie("flag; path=/", now),
            Some(("flag".to_string(), String::new()))
        );
    }

    #[test]
    fn formats_request_header() {
        let cookies = vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())];
        assert_eq!(format_cookie_header(&cookies), "a=1; b=2; ");
    }
}
