/*
 * email_address.rs
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

//! RFC 5322 email address (mailbox).

use crate::charset::Charset;
use crate::mime::rfc2047::encode_header_value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub display_name: Option<String>,
    pub local_part: String,
    pub domain: String,
}

impl EmailAddress {
    pub fn new(
        display_name: Option<impl Into<String>>,
        local_part: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.map(|s| s.into()),
            local_part: local_part.into(),
            domain: domain.into(),
        }
    }

    /// Parse a single `local@domain` (no display name). None when there is no `@`
    /// or either side is empty.
    pub fn parse_addr_spec(addr: &str) -> Option<Self> {
        let addr = addr.trim();
        let at = addr.rfind('@')?;
        let (local, domain) = (&addr[..at], &addr[at + 1..]);
        if local.is_empty() || domain.is_empty() || addr.contains(char::is_whitespace) {
            return None;
        }
        Some(Self::new(None::<String>, local, domain))
    }

    pub fn with_display_name(mut self, name: Option<impl Into<String>>) -> Self {
        self.display_name = name.map(|n| n.into()).filter(|n: &String| !n.is_empty());
        self
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Full mailbox address: local-part@domain.
    pub fn address(&self) -> String {
        format!("{}@{}", self.local_part, self.domain)
    }

    /// Display name when present, otherwise the bare address.
    pub fn personal_or_address(&self) -> String {
        match self.display_name() {
            Some(dn) if !dn.is_empty() => dn.to_string(),
            _ => self.address(),
        }
    }

    /// Header form with the display name encoded for `charset` when needed.
    pub fn to_header(&self, charset: Charset) -> String {
        format_mailbox(self.display_name(), &self.local_part, &self.domain, charset)
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_header(Charset::Utf8))
    }
}

/// Characters that force a display name into a quoted string.
fn needs_quoting(name: &str) -> bool {
    name.chars()
        .any(|c| matches!(c, '(' | ')' | '<' | '>' | '[' | ']' | ':' | ';' | '@' | '\\' | ',' | '.' | '"'))
}

/// Format a mailbox for headers. Non-ASCII display names become encoded words;
/// names with specials are quoted.
pub fn format_mailbox(
    display_name: Option<&str>,
    local_part: &str,
    domain: &str,
    charset: Charset,
) -> String {
    let addr = if domain.is_empty() {
        local_part.to_string()
    } else {
        format!("{}@{}", local_part, domain)
    };
    match display_name {
        Some(dn) if !dn.is_empty() => {
            let phrase = if !dn.is_ascii() {
                encode_header_value(dn, charset)
            } else if needs_quoting(dn) {
                format!("\"{}\"", dn.replace('\\', "\\\\").replace('"', "\\\""))
            } else {
                dn.to_string()
            };
            format!("{} <{}>", phrase, addr)
        }
        _ => format!("<{}>", addr),
    }
}
