/*
 * base64.rs
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

//! Base64 for Content-Transfer-Encoding (RFC 2045) and B-encoded words (RFC 2047).

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Maximum encoded line length for MIME bodies.
pub const LINE_LENGTH: usize = 76;

const WHITESPACE: i8 = -2;

fn decode_table() -> &'static [i8; 256] {
    static TABLE: OnceLock<[i8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [-1i8; 256];
        t[b' ' as usize] = WHITESPACE;
        t[b'\t' as usize] = WHITESPACE;
        t[b'\r' as usize] = WHITESPACE;
        t[b'\n' as usize] = WHITESPACE;
        for i in 0..26u8 {
            t[(b'A' + i) as usize] = i as i8;
            t[(b'a' + i) as usize] = (26 + i) as i8;
        }
        for i in 0..10u8 {
            t[(b'0' + i) as usize] = (52 + i) as i8;
        }
        t[b'+' as usize] = 62;
        t[b'/' as usize] = 63;
        t
    })
}

/// Lenient decode: whitespace and invalid bytes are skipped, decoding stops at `=`.
/// Mail in the wild has broken padding often enough that strict decoding loses text.
pub fn decode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() * 3 / 4);
    let mut quantum: u32 = 0;
    let mut bits: u32 = 0;
    for &b in src {
        if b == b'=' {
            break;
        }
        let val = decode_table()[b as usize];
        if val < 0 {
            continue;
        }
        quantum = (quantum << 6) | val as u32;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((quantum >> bits) as u8);
        }
    }
    out
}

/// Encode without line breaks.
pub fn encode(src: &[u8]) -> String {
    STANDARD.encode(src)
}

/// Encode split into CRLF-terminated lines of `LINE_LENGTH` characters.
pub fn encode_lines(src: &[u8]) -> String {
    let encoded = STANDARD.encode(src);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_LENGTH * 2 + 2);
    for chunk in encoded.as_bytes().chunks(LINE_LENGTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}
