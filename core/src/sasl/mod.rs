/*
 * mod.rs
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

//! SASL client side for SMTP submission: PLAIN, LOGIN and CRAM-MD5.
//!
//! - `initial_client_response` builds the payload sent with `AUTH <mech>`
//! - `respond_to_challenge` answers a 334 challenge
//!
//! Payloads are raw bytes; the caller base64-encodes them for the wire.

mod mechanism;
mod plain;

pub use mechanism::SaslMechanism;
pub use plain::encode_plain;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use thiserror::Error;

type HmacMd5 = Hmac<md5::Md5>;

#[derive(Debug, Error)]
pub enum SaslError {
    #[error("invalid base64 in server challenge")]
    InvalidChallenge,
    #[error("unexpected LOGIN challenge: {0}")]
    UnexpectedLoginPrompt(String),
    #[error("{0} does not take a challenge")]
    NoChallenge(&'static str),
    #[error("HMAC key rejected")]
    Hmac,
}

/// Initial client response for `mechanism`. Empty for LOGIN and CRAM-MD5, which wait for a challenge.
pub fn initial_client_response(
    mechanism: SaslMechanism,
    authzid: &str,
    authcid: &str,
    password: &str,
) -> Vec<u8> {
    match mechanism {
        SaslMechanism::Plain => encode_plain(authzid, authcid, password),
        SaslMechanism::Login | SaslMechanism::CramMd5 => Vec::new(),
    }
}

/// Answer a base64 server challenge. The returned bytes are not yet base64-encoded.
pub fn respond_to_challenge(
    mechanism: SaslMechanism,
    challenge_b64: &str,
    authcid: &str,
    password: &str,
) -> Result<Vec<u8>, SaslError> {
    match mechanism {
        SaslMechanism::CramMd5 => cram_md5_response(authcid, password, challenge_b64),
        SaslMechanism::Login => login_respond_to_challenge(challenge_b64, authcid, password),
        SaslMechanism::Plain => Err(SaslError::NoChallenge(mechanism.name())),
    }
}

/// LOGIN: first challenge is "Username:", second is "Password:".
pub fn login_respond_to_challenge(
    challenge_b64: &str,
    authcid: &str,
    password: &str,
) -> Result<Vec<u8>, SaslError> {
    let decoded = decode_challenge(challenge_b64)?;
    let prompt = String::from_utf8_lossy(&decoded).to_lowercase();
    if prompt.contains("username") {
        Ok(authcid.as_bytes().to_vec())
    } else if prompt.contains("password") {
        Ok(password.as_bytes().to_vec())
    } else {
        Err(SaslError::UnexpectedLoginPrompt(prompt))
    }
}

fn decode_challenge(challenge_b64: &str) -> Result<Vec<u8>, SaslError> {
    STANDARD
        .decode(challenge_b64.trim())
        .map_err(|_| SaslError::InvalidChallenge)
}

fn cram_md5_response(
    authcid: &str,
    password: &str,
    challenge_b64: &str,
) -> Result<Vec<u8>, SaslError> {
    let challenge = decode_challenge(challenge_b64)?;
    let mut mac = HmacMd5::new_from_slice(password.as_bytes()).map_err(|_| SaslError::Hmac)?;
    mac.update(&challenge);
    let digest = mac.finalize().into_bytes();
    let mut response = String::with_capacity(authcid.len() + 33);
    response.push_str(authcid);
    response.push(' ');
    for b in digest.iter() {
        response.push_str(&format!("{:02x}", b));
    }
    Ok(response.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_initial_response() {
        let r = initial_client_response(SaslMechanism::Plain, "", "tim", "tanstaaf");
        assert_eq!(r, b"\0tim\0tanstaaf");
    }

    #[test]
    fn login_prompts() {
        let user = STANDARD.encode("Username:");
        let pass = STANDARD.encode("Password:");
        assert_eq!(login_respond_to_challenge(&user, "u", "p").unwrap(), b"u");
        assert_eq!(login_respond_to_challenge(&pass, "u", "p").unwrap(), b"p");
        let other = STANDARD.encode("Realm:");
        assert!(login_respond_to_challenge(&other, "u", "p").is_err());
    }

    #[test]
    fn cram_md5_rfc2195() {
        // RFC 2195 section 2 example
        let challenge = STANDARD.encode("<1896.697170952@postoffice.reston.mci.net>");
        let r = respond_to_challenge(SaslMechanism::CramMd5, &challenge, "tim", "tanstaaftanstaaf")
            .unwrap();
        assert_eq!(
            String::from_utf8(r).unwrap(),
            "tim b913a602c7eda7a495b4e6e7334d3890"
        );
    }

    #[test]
    fn plain_has_no_challenge() {
        assert!(respond_to_challenge(SaslMechanism::Plain, "", "a", "b").is_err());
    }
}
