/*
 * urlencode.rs
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

//! `application/x-www-form-urlencoded` values in a named charset.

use crate::charset::Charset;
use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes left as-is besides alphanumerics. Space is handled separately.
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'*')
    .remove(b'_');

/// Encode `value`: unreserved characters pass, space becomes `+`, everything else is `%XX`
/// of its byte in `charset`. Characters the charset cannot represent are sent as `?`.
pub fn encode(value: &str, charset: Charset) -> String {
    let bytes = charset.encode(value);
    percent_encode(&bytes, FORM).to_string().replace("%20", "+")
}

/// Decode `+` and `%XX` sequences, then the bytes in `charset`.
/// Returns None for a truncated or non-hex escape.
pub fn decode(value: &str, charset: Charset) -> Option<String> {
    let src = value.as_bytes();
    let mut bytes = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        match src[i] {
            b'+' => bytes.push(b' '),
            b'%' => {
                let hex = src
                    .get(i + 1..i + 3)
                    .filter(|h| h.iter().all(u8::is_ascii_hexdigit))?;
                let hex = std::str::from_utf8(hex).ok()?;
                bytes.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            }
            b => bytes.push(b),
        }
        i += 1;
    }
    Some(charset.decode(&bytes))
}

/// `k=encode(v)&k2=encode(v2)`. Keys are sent as given.
pub fn encode_params(params: &[(String, String)], charset: Charset) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, encode(v, charset)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_latin1_bytes() {
        assert_eq!(encode("año nuevo", Charset::Latin1), "a%F1o+nuevo");
        assert_eq!(encode("a.b-c*d_e~", Charset::Latin1), "a.b-c*d_e%7E");
        assert_eq!(encode("€", Charset::Latin1), "%3F");
    }

    #[test]
    fn decodes_plus_and_escapes() {
        assert_eq!(decode("a%F1o+nuevo", Charset::Latin1).as_deref(), Some("año nuevo"));
        assert_eq!(decode("caf%C3%A9", Charset::Utf8).as_deref(), Some("café"));
        assert_eq!(decode("bad%2", Charset::Utf8), None);
        assert_eq!(decode("bad%zz", Charset::Utf8), None);
    }

    #[test]
    fn signed_escapes_are_rejected() {
        assert_eq!(decode("%+f", Charset::Latin1), None);
        assert_eq!(decode("a%-1b", Charset::Latin1), None);
        assert_eq!(decode("%+", Charset::Latin1), None);
        assert_eq!(decode("%0a%Ff", Charset::Latin1).as_deref(), Some("\n\u{ff}"));
    }

    #[test]
    fn joins_params() {
        let params = vec![
            ("q".to_string(), "a b".to_string()),
            ("n".to_string(), "1&2".to_string()),
        ];
        assert_eq!(encode_params(&params, Charset::Latin1), "q=a+b&n=1%262");
    }
}
