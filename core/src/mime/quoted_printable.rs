/*
 * quoted_printable.rs
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

//! Quoted-Printable for Content-Transfer-Encoding (RFC 2045 section 6.7).

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i = i.wrapping_add(1);
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i = i.wrapping_add(1);
    }
    t
};

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Soft line limit, excluding the trailing `=`.
const MAX_LINE: usize = 75;

/// Decode =XX escapes and soft line breaks (=CRLF, =LF). A malformed `=` is kept literally.
pub fn decode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        let b = src[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }
        let h1 = src.get(i + 1).copied();
        let h2 = src.get(i + 2).copied();
        match (h1, h2) {
            (Some(a), Some(c)) if HEX_DECODE[a as usize] >= 0 && HEX_DECODE[c as usize] >= 0 => {
                out.push(((HEX_DECODE[a as usize] << 4) | HEX_DECODE[c as usize]) as u8);
                i += 3;
            }
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

/// Encode bytes as quoted-printable text lines. Line breaks in the input become CRLF hard
/// breaks; trailing whitespace before a break is escaped so transports cannot strip it.
pub fn encode(src: &[u8]) -> String {
    let mut out = String::with_capacity(src.len() + src.len() / 8);
    let mut line_len = 0usize;
    let mut i = 0;
    while i < src.len() {
        let b = src[i];
        if b == b'\r' && src.get(i + 1) == Some(&b'\n') {
            out.push_str("\r\n");
            line_len = 0;
            i += 2;
            continue;
        }
        if b == b'\n' {
            out.push_str("\r\n");
            line_len = 0;
            i += 1;
            continue;
        }
        let at_line_end = matches!(src.get(i + 1), None | Some(b'\r') | Some(b'\n'));
        let literal = match b {
            b' ' | b'\t' => !at_line_end,
            b'=' => false,
            33..=126 => true,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };
        if line_len + width > MAX_LINE {
            out.push_str("=\r\n");
            line_len = 0;
        }
        if literal {
            out.push(b as char);
        } else {
            out.push('=');
            out.push(HEX_UPPER[(b >> 4) as usize] as char);
            out.push(HEX_UPPER[(b & 15) as usize] as char);
        }
        line_len += width;
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_escapes_and_soft_breaks() {
        assert_eq!(decode(b"caf=E9=\r\n au lait"), b"caf\xe9 au lait");
        assert_eq!(decode(b"a=\nb"), b"ab");
        assert_eq!(decode(b"bad=ZZ"), b"bad=ZZ");
        assert_eq!(decode(b"end="), b"end=");
    }

    #[test]
    fn encode_escapes() {
        assert_eq!(encode(b"a=b"), "a=3Db");
        assert_eq!(encode(b"caf\xc3\xa9"), "caf=C3=A9");
        assert_eq!(encode(b"trailing \nnext"), "trailing=20\r\nnext");
    }

    #[test]
    fn encode_soft_breaks_long_lines() {
        let long = vec![b'x'; 200];
        let encoded = encode(&long);
        for line in encoded.split("\r\n") {
            assert!(line.len() <= 76, "line too long: {}", line.len());
        }
        assert_eq!(decode(encoded.as_bytes()), long);
    }
}
