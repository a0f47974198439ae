/*
 * authenticator.rs
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

//! Account credentials handed to the store login and to SMTP AUTH.

use std::fmt;

/// User name and password, answered without prompting whenever a server asks.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// (user, password) for `SmtpOptions::auth`, None when the user is empty.
    pub fn smtp_auth(&self) -> Option<(String, String)> {
        if self.user.is_empty() {
            None
        } else {
            Some((self.user.clone(), self.password.clone()))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_password() {
        let c = Credentials::new("joe", "s3cret");
        let shown = format!("{:?}", c);
        assert!(shown.contains("joe"));
        assert!(!shown.contains("s3cret"));
    }

    #[test]
    fn empty_user_has_no_smtp_auth() {
        assert_eq!(Credentials::new("", "x").smtp_auth(), None);
        assert_eq!(
            Credentials::new("joe", "pw").smtp_auth(),
            Some(("joe".to_string(), "pw".to_string()))
        );
    }
}
