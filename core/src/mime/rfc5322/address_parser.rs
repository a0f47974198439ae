/*
 * address_parser.rs
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

//! RFC 5322 address list parsing (From, To, Cc, Reply-To).

use super::email_address::EmailAddress;
use crate::mime::rfc2047::decode_encoded_words;

/// Parse a comma-separated list of mailboxes from a header value.
/// Supports `"Quoted Name" <local@domain>`, `Plain Name <local@domain>`, bare
/// `local@domain` and groups (`team: a@x, b@y;`). Entries that are not mailboxes are skipped;
/// None is returned only when nothing parses from a non-empty value.
pub fn parse_email_address_list(value: &str) -> Option<Vec<EmailAddress>> {
    let value = value.trim();
    if value.is_empty() {
        return Some(Vec::new());
    }
    let mut out = Vec::new();
    let bytes = value.as_bytes();
    let len = bytes.len();
    let mut pos = 0;

    while pos < len {
        skip_ws(bytes, len, &mut pos);
        if pos >= len {
            break;
        }
        let end = find_entry_end(bytes, len, pos);
        let entry = strip_group(&value[pos..end]);
        if let Some(addr) = parse_one_address(entry) {
            out.push(addr);
        }
        pos = end + 1;
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn skip_ws(bytes: &[u8], len: usize, pos: &mut usize) {
    while *pos < len && matches!(bytes[*pos], b' ' | b'\t' | b'\r' | b'\n' | b',' | b';') {
        *pos += 1;
    }
}

/// Index of the next top-level `,` or `;`, honouring quotes and angle brackets.
fn find_entry_end(bytes: &[u8], len: usize, from: usize) -> usize {
    let mut in_quote = false;
    let mut in_angle = false;
    let mut i = from;
    while i < len {
        match bytes[i] {
            b'\\' if in_quote => i += 1,
            b'"' => in_quote = !in_quote,
            b'<' if !in_quote => in_angle = true,
            b'>' if !in_quote => in_angle = false,
            b',' | b';' if !in_quote && !in_angle => return i,
            _ => {}
        }
        i += 1;
    }
    len
}

/// `team: a@x` -> `a@x` (group display name dropped).
fn strip_group(entry: &str) -> &str {
    if let Some(colon) = entry.find(':') {
        let before = &entry[..colon];
        if !before.contains('"') && !before.contains('<') && !before.contains('@') {
            return entry[colon + 1..].trim();
        }
    }
    entry.trim()
}

fn parse_one_address(entry: &str) -> Option<EmailAddress> {
    let entry = strip_comments(entry);
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }
    match (entry.rfind('<'), entry.rfind('>')) {
        (Some(lt), Some(gt)) if gt > lt => {
            let addr = EmailAddress::parse_addr_spec(&entry[lt + 1..gt])?;
            let phrase = unquote(entry[..lt].trim());
            let name = decode_encoded_words(&phrase);
            Some(addr.with_display_name(Some(name)))
        }
        (Some(_), _) => None,
        _ => EmailAddress::parse_addr_spec(entry),
    }
}

/// Remove `(comment)` text outside quoted strings.
fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0u32;
    let mut in_quote = false;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            if depth == 0 {
                out.push(c);
            }
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                if depth == 0 {
                    out.push(c);
                }
            }
            '"' if depth == 0 => {
                in_quote = !in_quote;
                out.push(c);
            }
            '(' if !in_quote => depth += 1,
            ')' if !in_quote && depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let inner = &s[1..s.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(n) = chars.next() {
                    out.push(n);
                }
            } else {
                out.push(c);
            }
        }
        out
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_list() {
        let list = parse_email_address_list(
            "\"Lee, Ann\" <ann@example.com>, Bob Roe <bob@example.org>, carol@example.net",
        )
        .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].display_name(), Some("Lee, Ann"));
        assert_eq!(list[0].address(), "ann@example.com");
        assert_eq!(list[1].display_name(), Some("Bob Roe"));
        assert_eq!(list[2].display_name(), None);
        assert_eq!(list[2].address(), "carol@example.net");
    }

    #[test]
    fn encoded_display_name() {
        let list = parse_email_address_list("=?ISO-8859-1?Q?Jos=E9?= <jose@example.es>").unwrap();
        assert_eq!(list[0].display_name(), Some("Jos\u{e9}"));
    }

    #[test]
    fn groups_and_comments() {
        let list =
            parse_email_address_list("team: a@x.org (Alpha), b@y.org;, undisclosed-recipients:;")
                .unwrap();
        let addrs: Vec<String> = list.iter().map(|a| a.address()).collect();
        assert_eq!(addrs, vec!["a@x.org", "b@y.org"]);
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_email_address_list("not an address").is_none());
        assert_eq!(parse_email_address_list("  ").unwrap().len(), 0);
    }
}
