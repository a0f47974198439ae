/*
 * charset.rs
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

//! Named character sets used by web pages, form encoding and mail bodies.
//!
//! Only the single-byte Western sets and UTF-8 are supported. Labels follow the
//! IANA names plus the historical Java aliases (`ISO8859_1`, `UTF8`, `Cp1252`).

use std::fmt;

/// windows-1252 code points for bytes 0x80..=0x9F; 0 marks an undefined byte.
const CP1252_HIGH: [u32; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// ISO-8859-15 differs from Latin-1 at these eight positions.
const LATIN9_DIFF: [(u8, char); 8] = [
    (0xA4, '\u{20AC}'),
    (0xA6, '\u{0160}'),
    (0xA8, '\u{0161}'),
    (0xB4, '\u{017D}'),
    (0xB8, '\u{017E}'),
    (0xBC, '\u{0152}'),
    (0xBD, '\u{0153}'),
    (0xBE, '\u{0178}'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    UsAscii,
    Latin1,
    Latin9,
    Windows1252,
    Utf8,
}

impl Charset {
    /// Resolve a charset label (case-insensitive). Returns None for unsupported sets.
    pub fn from_label(label: &str) -> Option<Self> {
        let norm: String = label
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect();
        match norm.as_str() {
            "usascii" | "ascii" | "us" | "ansix3.41968" | "iso646us" => Some(Charset::UsAscii),
            "iso88591" | "latin1" | "l1" | "iso8859.1" | "cp819" => Some(Charset::Latin1),
            "iso885915" | "latin9" | "latin0" => Some(Charset::Latin9),
            "windows1252" | "cp1252" => Some(Charset::Windows1252),
            "utf8" => Some(Charset::Utf8),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Charset::UsAscii => "US-ASCII",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Latin9 => "ISO-8859-15",
            Charset::Windows1252 => "windows-1252",
            Charset::Utf8 => "UTF-8",
        }
    }

    /// Decode bytes. Bytes with no mapping become U+FFFD.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::UsAscii => bytes
                .iter()
                .map(|&b| if b < 0x80 { b as char } else { '\u{FFFD}' })
                .collect(),
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Charset::Latin9 => bytes
                .iter()
                .map(|&b| {
                    LATIN9_DIFF
                        .iter()
                        .find(|(k, _)| *k == b)
                        .map(|(_, c)| *c)
                        .unwrap_or(b as char)
                })
                .collect(),
            Charset::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => char::from_u32(CP1252_HIGH[(b - 0x80) as usize])
                        .filter(|c| *c != '\0')
                        .unwrap_or('\u{FFFD}'),
                    _ => b as char,
                })
                .collect(),
        }
    }

    /// Encode a string. Characters with no mapping become `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => text.as_bytes().to_vec(),
            _ => text.chars().map(|c| self.encode_char(c).unwrap_or(b'?')).collect(),
        }
    }

    /// Single-byte encoding of `c`, or None when unmappable. Always None for UTF-8.
    pub fn encode_char(&self, c: char) -> Option<u8> {
        let cp = c as u32;
        match self {
            Charset::Utf8 => None,
            Charset::UsAscii => (cp < 0x80).then_some(cp as u8),
            Charset::Latin1 => (cp < 0x100).then_some(cp as u8),
            Charset::Latin9 => {
                if let Some((b, _)) = LATIN9_DIFF.iter().find(|(_, ch)| *ch == c) {
                    return Some(*b);
                }
                if cp < 0x100 && !LATIN9_DIFF.iter().any(|(b, _)| *b as u32 == cp) {
                    Some(cp as u8)
                } else {
                    None
                }
            }
            Charset::Windows1252 => {
                if let Some(i) = CP1252_HIGH.iter().position(|&u| u != 0 && u == cp) {
                    return Some(0x80 + i as u8);
                }
                (cp < 0x80 || (0xA0..0x100).contains(&cp)).then_some(cp as u8)
            }
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decode with a label, falling back to lossy UTF-8 for unknown labels.
pub fn decode_with_label(bytes: &[u8], label: &str) -> String {
    match Charset::from_label(label) {
        Some(cs) => cs.decode(bytes),
        None => {
            tracing::debug!(label, "unknown charset, decoding as UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn java_aliases() {
        assert_eq!(Charset::from_label("ISO8859_1"), Some(Charset::Latin1));
        assert_eq!(Charset::from_label("UTF8"), Some(Charset::Utf8));
        assert_eq!(Charset::from_label("ASCII"), Some(Charset::UsAscii));
        assert_eq!(Charset::from_label("Cp1252"), Some(Charset::Windows1252));
        assert_eq!(Charset::from_label("\"iso-8859-15\""), Some(Charset::Latin9));
        assert_eq!(Charset::from_label("koi8-r"), None);
    }

    #[test]
    fn latin1_round_trip() {
        let bytes = Charset::Latin1.encode("caf\u{e9} \u{f1}");
        assert_eq!(bytes, b"caf\xe9 \xf1");
        assert_eq!(Charset::Latin1.decode(&bytes), "caf\u{e9} \u{f1}");
    }

    #[test]
    fn unmappable_becomes_question_mark() {
        assert_eq!(Charset::UsAscii.encode("a\u{e9}b"), b"a?b");
        assert_eq!(Charset::Latin1.encode("\u{20ac}"), b"?");
    }

    #[test]
    fn euro_sign() {
        assert_eq!(Charset::Windows1252.encode("\u{20ac}"), vec![0x80]);
        assert_eq!(Charset::Latin9.encode("\u{20ac}"), vec![0xA4]);
        assert_eq!(Charset::Windows1252.decode(&[0x80, 0x93]), "\u{20ac}\u{201c}");
        assert_eq!(Charset::Latin9.decode(&[0xA4]), "\u{20ac}");
    }

    #[test]
    fn ascii_decode_replaces_high_bytes() {
        assert_eq!(Charset::UsAscii.decode(b"ok\xff"), "ok\u{FFFD}");
    }
}
