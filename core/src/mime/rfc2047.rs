/*
 * rfc2047.rs
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

//! RFC 2047 encoded words (e.g. `=?charset?q?text?=`) in header values.

use crate::charset::{decode_with_label, Charset};
use crate::mime::base64;
use crate::mime::quoted_printable;

const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Longest encoded word allowed by RFC 2047 section 2.
const MAX_ENCODED_WORD: usize = 75;

/// Expand encoded words. Whitespace between two adjacent encoded words is dropped (section 6.2).
pub fn decode_encoded_words(s: &str) -> String {
    let mut out = String::new();
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut pos = 0;
    let mut last_was_word = false;

    while pos < len {
        let Some(start) = find_encoded_word_start(bytes, pos) else {
            out.push_str(&s[pos..]);
            break;
        };
        let literal = &s[pos..start];
        let mut cursor = start;
        match decode_one_encoded_word(bytes, len, &mut cursor) {
            Some(decoded) => {
                if !(last_was_word && literal.trim().is_empty()) {
                    out.push_str(literal);
                }
                out.push_str(&decoded);
                pos = cursor;
                last_was_word = true;
            }
            None => {
                out.push_str(&s[pos..start + 2]);
                pos = start + 2;
                last_was_word = false;
            }
        }
    }
    out
}

fn find_encoded_word_start(bytes: &[u8], from: usize) -> Option<usize> {
    let rest = bytes.get(from..)?;
    rest.windows(2).position(|w| w == b"=?").map(|i| from + i)
}

/// Decode one encoded word at `pos`; on success `pos` is left after `?=`.
fn decode_one_encoded_word(bytes: &[u8], len: usize, pos: &mut usize) -> Option<String> {
    if *pos + 4 > len || &bytes[*pos..*pos + 2] != b"=?" {
        return None;
    }
    let charset_start = *pos + 2;
    let qmark1 = bytes[charset_start..].iter().position(|&b| b == b'?')? + charset_start;
    if qmark1 == charset_start || qmark1 + 2 >= len || bytes[qmark1 + 2] != b'?' {
        return None;
    }
    let charset = std::str::from_utf8(&bytes[charset_start..qmark1]).ok()?.trim();
    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);
    let encoding = bytes[qmark1 + 1].to_ascii_lowercase();
    let payload_start = qmark1 + 3;
    let end_in_rest = bytes[payload_start..]
        .windows(2)
        .position(|w| w == b"?=")?;
    let payload = &bytes[payload_start..payload_start + end_in_rest];
    if payload.iter().any(|b| *b == b' ') {
        return None;
    }
    let decoded = match encoding {
        b'b' => base64::decode(payload),
        b'q' => decode_q(payload),
        _ => return None,
    };
    *pos = payload_start + end_in_rest + 2;
    Some(decode_with_label(&decoded, charset))
}

/// Q encoding: `_` is space, the rest is quoted-printable.
fn decode_q(payload: &[u8]) -> Vec<u8> {
    let replaced: Vec<u8> = payload
        .iter()
        .map(|&b| if b == b'_' { b' ' } else { b })
        .collect();
    quoted_printable::decode(&replaced)
}

/// Header bytes to string: UTF-8 when valid, otherwise ISO-8859-1.
pub fn header_bytes_to_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if !s.contains(REPLACEMENT_CHAR) => s.to_string(),
        _ => Charset::Latin1.decode(bytes),
    }
}

/// Encode a header value with B encoded words when it contains non-ASCII text.
/// ASCII values are returned unchanged. Words are split on character boundaries so
/// each stays within 75 characters.
pub fn encode_header_value(value: &str, charset: Charset) -> String {
    if value.is_ascii() {
        return value.to_string();
    }
    // Unmappable characters would turn into '?', so fall back to UTF-8.
    let charset = if charset == Charset::Utf8 || value.chars().all(|c| charset.encode_char(c).is_some()) {
        charset
    } else {
        Charset::Utf8
    };
    let prefix = format!("=?{}?B?", charset.name());
    let overhead = prefix.len() + 2;
    let max_raw = (MAX_ENCODED_WORD - overhead) / 4 * 3;

    let mut words = Vec::new();
    let mut current = Vec::new();
    let mut buf = [0u8; 4];
    for c in value.chars() {
        let encoded: Vec<u8> = match charset {
            Charset::Utf8 => c.encode_utf8(&mut buf).as_bytes().to_vec(),
            _ => vec![charset.encode_char(c).unwrap_or(b'?')],
        };
        if !current.is_empty() && current.len() + encoded.len() > max_raw {
            words.push(std::mem::take(&mut current));
        }
        current.extend_from_slice(&encoded);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .iter()
        .map(|w| format!("{}{}?=", prefix, base64::encode(w)))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_b() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SGVsbG8=?="), "Hello");
    }

    #[test]
    fn decode_q() {
        assert_eq!(decode_encoded_words("=?UTF-8?Q?Hello_World?="), "Hello World");
        assert_eq!(decode_encoded_words("=?iso-8859-1?q?caf=E9?="), "caf\u{e9}");
    }

    #[test]
    fn decode_mixed_literal() {
        assert_eq!(decode_encoded_words("Hello =?UTF-8?B?V29ybGQ=?=!"), "Hello World!");
    }

    #[test]
    fn adjacent_words_join() {
        assert_eq!(
            decode_encoded_words("=?UTF-8?Q?a?= =?UTF-8?Q?b?= c"),
            "ab c"
        );
    }

    #[test]
    fn malformed_word_is_kept() {
        assert_eq!(decode_encoded_words("50% =?off"), "50% =?off");
    }

    #[test]
    fn encode_ascii_unchanged() {
        assert_eq!(encode_header_value("Weekly report", Charset::Utf8), "Weekly report");
    }

    #[test]
    fn encode_round_trip() {
        let subject = "Informe mensual: a\u{f1}o 2026, se\u{f1}al \u{e1}\u{e9}\u{ed}\u{f3}\u{fa} \u{20ac}";
        let encoded = encode_header_value(subject, Charset::Utf8);
        for word in encoded.split("\r\n ") {
            assert!(word.len() <= MAX_ENCODED_WORD);
        }
        assert_eq!(decode_encoded_words(&encoded.replace("\r\n", "")), subject);
    }

    #[test]
    fn encode_falls_back_to_utf8() {
        let encoded = encode_header_value("\u{4e2d}\u{6587}", Charset::Latin1);
        assert!(encoded.starts_with("=?UTF-8?B?"));
    }

    #[test]
    fn header_bytes_latin1_fallback() {
        assert_eq!(header_bytes_to_string(b"caf\xe9"), "caf\u{e9}");
        assert_eq!(header_bytes_to_string("caf\u{e9}".as_bytes()), "caf\u{e9}");
    }
}
