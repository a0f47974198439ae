/*
 * client.rs
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

//! Async SMTP client: connect, EHLO, STARTTLS, AUTH, MAIL FROM, RCPT TO, DATA/BDAT, RSET, QUIT.

use crate::net::ClientStream;
use crate::protocol::smtp::dot_stuffer::stuff_message;
use crate::sasl::{initial_client_response, respond_to_challenge, SaslError, SaslMechanism};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// SMTP client error (network, protocol, auth).
#[derive(Debug, Error)]
pub enum SmtpClientError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Sasl(#[from] SaslError),
    /// Server replied with an unexpected code to `command`.
    #[error("{command} failed: {code} {message}")]
    Reply {
        command: &'static str,
        code: u16,
        message: String,
    },
    #[error("server offers none of the supported AUTH mechanisms")]
    NoAuthMechanism,
    #[error("no recipients")]
    NoRecipients,
}

impl SmtpClientError {
    /// Reply code when the server rejected a command.
    pub fn code(&self) -> Option<u16> {
        match self {
            SmtpClientError::Reply { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Parsed SMTP response (code + lines).
#[derive(Debug)]
pub(crate) struct SmtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpResponse {
    fn message(&self) -> &str {
        self.lines.last().map(|s| s.as_str()).unwrap_or("")
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    fn into_error(self, command: &'static str) -> SmtpClientError {
        SmtpClientError::Reply {
            command,
            code: self.code,
            message: self.message().to_string(),
        }
    }
}

/// Read one CRLF-terminated line into `buf` (cleared first). The CRLF is stripped.
async fn read_line<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    buf.clear();
    loop {
        let mut b = [0u8; 1];
        let n = stream.read(&mut b).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            ));
        }
        if b[0] == b'\n' {
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            return Ok(());
        }
        buf.push(b[0]);
    }
}

/// Read one SMTP response (single line or multi-line `250-...` continuation) from stream.
pub(crate) async fn read_response<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<SmtpResponse>
where
    S: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        read_line(stream, buf).await?;
        let line = String::from_utf8_lossy(buf).into_owned();
        if line.len() < 3 {
            continue;
        }
        let code: u16 = line[..3].parse().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, format!("bad SMTP reply: {}", line))
        })?;
        let continuation = line.as_bytes().get(3) == Some(&b'-');
        let text = line.get(4..).unwrap_or("").trim();
        lines.push(text.to_string());
        if !continuation {
            return Ok(SmtpResponse { code, lines });
        }
    }
}

/// Write a line (no CRLF) then CRLF.
async fn write_line<S>(stream: &mut S, line: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await?;
    Ok(())
}

/// Extensions advertised in the EHLO reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub starttls: bool,
    pub auth_methods: Vec<String>,
    pub chunking: bool,
}

/// Send EHLO and parse the extension lines. Falls back to HELO when EHLO is not recognised.
async fn ehlo<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    hostname: &str,
) -> Result<Capabilities, SmtpClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_line(stream, format!("EHLO {}", hostname).as_bytes()).await?;
    let r = read_response(stream, read_buf).await?;
    if r.code == 500 || r.code == 502 {
        write_line(stream, format!("HELO {}", hostname).as_bytes()).await?;
        let r = read_response(stream, read_buf).await?;
        if !r.is_success() {
            return Err(r.into_error("HELO"));
        }
        return Ok(Capabilities::default());
    }
    if !r.is_success() {
        return Err(r.into_error("EHLO"));
    }
    let mut caps = Capabilities::default();
    // first line is the server greeting text
    for line in r.lines.iter().skip(1) {
        let upper = line.to_uppercase();
        if upper == "STARTTLS" {
            caps.starttls = true;
        } else if upper.starts_with("AUTH ") || upper.starts_with("AUTH=") {
            for word in line.get(5..).unwrap_or("").split_whitespace() {
                caps.auth_methods.push(word.to_uppercase());
            }
        } else if upper == "CHUNKING" {
            caps.chunking = true;
        }
    }
    Ok(caps)
}

/// Perform AUTH with the preferred mechanism the server offers.
async fn do_auth<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    authcid: &str,
    password: &str,
    auth_methods: &[String],
) -> Result<SaslMechanism, SmtpClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mechanism = SaslMechanism::negotiate(auth_methods).ok_or(SmtpClientError::NoAuthMechanism)?;
    tracing::debug!(mechanism = mechanism.name(), "SMTP AUTH");

    let initial = initial_client_response(mechanism, "", authcid, password);
    let mut cmd = format!("AUTH {}", mechanism.name());
    if !initial.is_empty() {
        cmd.push(' ');
        cmd.push_str(&STANDARD.encode(&initial));
    }
    write_line(stream, cmd.as_bytes()).await?;

    loop {
        let r = read_response(stream, read_buf).await?;
        match r.code {
            235 => return Ok(mechanism),
            334 => {
                let response = respond_to_challenge(mechanism, r.message().trim(), authcid, password)?;
                write_line(stream, STANDARD.encode(&response).as_bytes()).await?;
            }
            _ => return Err(r.into_error("AUTH")),
        }
    }
}

/// MAIL FROM, RCPT TO for each recipient, then DATA or BDAT.
/// BDAT when the server advertises CHUNKING (no dot-stuffing); otherwise DATA with dot stuffing.
async fn send_transaction<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    sender: &str,
    recipients: &[String],
    message: &[u8],
    use_bdat: bool,
) -> Result<(), SmtpClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if recipients.is_empty() {
        return Err(SmtpClientError::NoRecipients);
    }
    write_line(stream, format!("MAIL FROM:<{}>", sender).as_bytes()).await?;
    let r = read_response(stream, read_buf).await?;
    if !r.is_success() {
        return Err(r.into_error("MAIL FROM"));
    }

    for rcpt in recipients {
        write_line(stream, format!("RCPT TO:<{}>", rcpt).as_bytes()).await?;
        let r = read_response(stream, read_buf).await?;
        if !r.is_success() && r.code != 251 && r.code != 252 {
            return Err(r.into_error("RCPT TO"));
        }
    }

    if use_bdat {
        write_line(stream, format!("BDAT {} LAST", message.len()).as_bytes()).await?;
        stream.write_all(message).await?;
        stream.flush().await?;
    } else {
        write_line(stream, b"DATA").await?;
        let r = read_response(stream, read_buf).await?;
        if r.code != 354 {
            return Err(r.into_error("DATA"));
        }
        stream.write_all(&stuff_message(message)).await?;
        stream.flush().await?;
    }

    let r = read_response(stream, read_buf).await?;
    if !r.is_success() {
        return Err(r.into_error("message"));
    }
    Ok(())
}

/// Connection settings for `SmtpConnection::connect`.
#[derive(Debug, Clone)]
pub struct SmtpOptions {
    pub host: String,
    pub port: u16,
    /// TLS from the first byte (smtps, port 465).
    pub implicit_tls: bool,
    /// Upgrade with STARTTLS when the server offers it.
    pub starttls: bool,
    /// (user, password). AUTH is skipped when None or the user is empty.
    pub auth: Option<(String, String)>,
    pub ehlo_hostname: String,
}

impl SmtpOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            implicit_tls: port == 465,
            starttls: true,
            auth: None,
            ehlo_hostname: "localhost".to_string(),
        }
    }
}

/// Persistent SMTP connection (after greeting, EHLO, optional STARTTLS, AUTH). Used for connection reuse.
pub struct SmtpConnection {
    stream: ClientStream,
    read_buf: Vec<u8>,
    capabilities: Capabilities,
}

impl SmtpConnection {
    /// Connect and setup (greeting, EHLO, optional STARTTLS and re-EHLO, AUTH). No send, no QUIT.
    pub async fn connect(options: &SmtpOptions) -> Result<Self, SmtpClientError> {
        let mut stream = ClientStream::connect(&options.host, options.port, options.implicit_tls).await?;
        let mut read_buf = Vec::with_capacity(512);
        let r = read_response(&mut stream, &mut read_buf).await?;
        if r.code != 220 {
            return Err(r.into_error("greeting"));
        }
        let mut capabilities = ehlo(&mut stream, &mut read_buf, &options.ehlo_hostname).await?;

        if capabilities.starttls && options.starttls && !stream.is_tls() {
            write_line(&mut stream, b"STARTTLS").await?;
            let r = read_response(&mut stream, &mut read_buf).await?;
            if r.code != 220 {
                return Err(r.into_error("STARTTLS"));
            }
            stream = stream.upgrade_to_tls(&options.host).await?;
            capabilities = ehlo(&mut stream, &mut read_buf, &options.ehlo_hostname).await?;
        }

        if let Some((user, password)) = &options.auth {
            if !user.is_empty() {
                do_auth(&mut stream, &mut read_buf, user, password, &capabilities.auth_methods)
                    .await?;
            }
        }
        tracing::debug!(host = %options.host, port = options.port, tls = stream.is_tls(), "SMTP session ready");
        Ok(Self {
            stream,
            read_buf,
            capabilities,
        })
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Send one message over this connection (no QUIT; connection stays open).
    /// A failed transaction is followed by RSET so the connection can be reused.
    pub async fn send_one(
        &mut self,
        sender: &str,
        recipients: &[String],
        message: &[u8],
    ) -> Result<(), SmtpClientError> {
        let result = send_transaction(
            &mut self.stream,
            &mut self.read_buf,
            sender,
            recipients,
            message,
            self.capabilities.chunking,
        )
        .await;
        if let Err(SmtpClientError::Reply { .. }) = &result {
            self.reset().await?;
        }
        result
    }

    /// RSET: abort the current transaction.
    pub async fn reset(&mut self) -> Result<(), SmtpClientError> {
        write_line(&mut self.stream, b"RSET").await?;
        let r = read_response(&mut self.stream, &mut self.read_buf).await?;
        if !r.is_success() {
            return Err(r.into_error("RSET"));
        }
        Ok(())
    }

    /// QUIT and close. The reply is read but not checked.
    pub async fn quit(mut self) -> Result<(), SmtpClientError> {
        write_line(&mut self.stream, b"QUIT").await?;
        let _ = read_response(&mut self.stream, &mut self.read_buf).await;
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}

/// One-shot session: connect, send one message, QUIT.
pub async fn send_message_async(
    options: &SmtpOptions,
    sender: &str,
    recipients: &[String],
    message: &[u8],
) -> Result<(), SmtpClientError> {
    let mut conn = SmtpConnection::connect(options).await?;
    conn.send_one(sender, recipients, message).await?;
    conn.quit().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn multiline_response_collects_lines() {
        let data = b"250-mail.example.com\r\n250-STARTTLS\r\n250 AUTH PLAIN LOGIN\r\n".to_vec();
        let mut stream = std::io::Cursor::new(data);
        let mut buf = Vec::new();
        let r = read_response(&mut stream, &mut buf).await.unwrap();
        assert_eq!(r.code, 250);
        assert_eq!(r.lines, vec!["mail.example.com", "STARTTLS", "AUTH PLAIN LOGIN"]);
    }

    #[tokio::test]
    async fn eof_mid_response_is_error() {
        let mut stream = std::io::Cursor::new(b"250-partial\r\n".to_vec());
        let mut buf = Vec::new();
        assert!(read_response(&mut stream, &mut buf).await.is_err());
    }

    #[tokio::test]
    async fn ehlo_parses_capabilities() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let server_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            read_line(&mut server, &mut buf).await.unwrap();
            assert_eq!(buf, b"EHLO client.test");
            server
                .write_all(b"250-mx.test\r\n250-STARTTLS\r\n250-CHUNKING\r\n250 AUTH CRAM-MD5 PLAIN\r\n")
                .await
                .unwrap();
        });
        let mut buf = Vec::new();
        let caps = ehlo(&mut client, &mut buf, "client.test").await.unwrap();
        server_task.await.unwrap();
        assert!(caps.starttls);
        assert!(caps.chunking);
        assert_eq!(caps.auth_methods, vec!["CRAM-MD5", "PLAIN"]);
    }

    #[test]
    fn reply_error_exposes_code() {
        let e = SmtpResponse {
            code: 550,
            lines: vec!["no such user".into()],
        }
        .into_error("RCPT TO");
        assert_eq!(e.code(), Some(550));
        assert_eq!(e.to_string(), "RCPT TO failed: 550 no such user");
    }
}
