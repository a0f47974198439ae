/*
 * mechanism.rs
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

//! SASL mechanism names.

/// Mechanisms the SMTP client can negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    /// PLAIN (RFC 4616).
    Plain,
    /// Legacy LOGIN.
    Login,
    /// CRAM-MD5 (RFC 2195), challenge-response.
    CramMd5,
}

impl SaslMechanism {
    /// Client preference order when the server offers several.
    pub const PREFERENCE: [SaslMechanism; 3] =
        [SaslMechanism::Plain, SaslMechanism::Login, SaslMechanism::CramMd5];

    pub fn name(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::Login => "LOGIN",
            SaslMechanism::CramMd5 => "CRAM-MD5",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "PLAIN" => Some(SaslMechanism::Plain),
            "LOGIN" => Some(SaslMechanism::Login),
            "CRAM-MD5" => Some(SaslMechanism::CramMd5),
            _ => None,
        }
    }

    /// First mechanism in preference order that appears in `offered` (EHLO AUTH words).
    pub fn negotiate(offered: &[String]) -> Option<Self> {
        Self::PREFERENCE
            .iter()
            .copied()
            .find(|m| offered.iter().any(|o| o.eq_ignore_ascii_case(m.name())))
    }
}

impl std::fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_prefers_plain() {
        let offered = vec!["CRAM-MD5".to_string(), "login".to_string(), "PLAIN".to_string()];
        assert_eq!(SaslMechanism::negotiate(&offered), Some(SaslMechanism::Plain));
        let offered = vec!["CRAM-MD5".to_string()];
        assert_eq!(SaslMechanism::negotiate(&offered), Some(SaslMechanism::CramMd5));
        assert_eq!(SaslMechanism::negotiate(&[]), None);
    }

    #[test]
    fn names_round_trip() {
        for m in SaslMechanism::PREFERENCE {
            assert_eq!(SaslMechanism::from_name(m.name()), Some(m));
        }
        assert_eq!(SaslMechanism::from_name("XOAUTH2"), None);
    }
}
