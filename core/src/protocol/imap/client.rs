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

//! Async IMAP client, read-only subset: greeting, LOGIN, SELECT, FETCH of flags, size and
//! header literals, LOGOUT.

use crate::net::ClientStream;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// IMAP client error (network, protocol, auth).
#[derive(Debug, Error)]
pub enum ImapClientError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("expected * OK greeting, got: {0}")]
    Greeting(String),
    /// Tagged NO or BAD; holds the whole response line.
    #[error("IMAP command failed: {0}")]
    Command(String),
}

/// One line of IMAP response (untagged * or tagged A001).
#[derive(Debug, Clone)]
pub struct ImapLine {
    pub raw: String,
    pub tag: Option<String>,
    pub untagged: bool,
    pub status: Option<ImapStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImapStatus {
    Ok,
    No,
    Bad,
}

fn parse_status(rest: &str) -> Option<ImapStatus> {
    let word = rest.split_whitespace().next()?;
    match word.to_ascii_uppercase().as_str() {
        "OK" => Some(ImapStatus::Ok),
        "NO" => Some(ImapStatus::No),
        "BAD" => Some(ImapStatus::Bad),
        _ => None,
    }
}

/// Parse "* OK ..." or "A001 OK ..." from a line.
fn parse_line(s: &str) -> ImapLine {
    let untagged = s.starts_with('*');
    let (tag, status) = if untagged {
        (None, parse_status(s.trim_start_matches('*')))
    } else {
        let (t, rest) = s.split_once(' ').unwrap_or((s, ""));
        (Some(t.to_string()), parse_status(rest))
    };
    ImapLine {
        raw: s.to_string(),
        tag: tag.filter(|t| !t.is_empty()),
        untagged,
        status,
    }
}

/// Literal size when the line ends with `{N}`.
fn literal_size(line: &str) -> Option<usize> {
    let open = line.rfind('{')?;
    line[open + 1..].strip_suffix('}')?.trim().parse().ok()
}

/// Read one logical response line. Literals (`{N}` followed by N bytes) are collected in order
/// and the text around them is joined into one line for parsing.
async fn read_imap_line<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<(String, Vec<Vec<u8>>)>
where
    S: AsyncRead + Unpin,
{
    let mut text = String::new();
    let mut literals = Vec::new();
    loop {
        buf.clear();
        loop {
            let mut b = [0u8; 1];
            let n = stream.read(&mut b).await?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
            }
            buf.push(b[0]);
            if buf.ends_with(b"\r\n") {
                break;
            }
        }
        let part = String::from_utf8_lossy(&buf[..buf.len() - 2]).into_owned();
        text.push_str(&part);
        match literal_size(&part) {
            Some(n) => {
                let mut lit = vec![0u8; n];
                stream.read_exact(&mut lit).await?;
                literals.push(lit);
            }
            None => return Ok((text.trim().to_string(), literals)),
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

/// Untagged line plus its literals (e.g. FETCH header).
pub struct ImapLineWithLiteral(pub ImapLine, pub Vec<Vec<u8>>);

/// Send `tag command`, collect untagged lines until the tagged completion.
async fn send_command<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    tag: &str,
    command: &str,
) -> Result<(Vec<ImapLineWithLiteral>, ImapLine), ImapClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let full = format!("{} {}", tag, command);
    write_line(stream, full.as_bytes()).await?;

    let mut untagged = Vec::new();
    loop {
        let (line_str, literals) = read_imap_line(stream, read_buf).await?;
        let line = parse_line(&line_str);
        if !line.untagged && line.tag.as_deref() == Some(tag) {
            return Ok((untagged, line));
        }
        untagged.push(ImapLineWithLiteral(line, literals));
    }
}

fn quote_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn expect_ok(line: ImapLine) -> Result<(), ImapClientError> {
    match line.status {
        Some(ImapStatus::Ok) => Ok(()),
        _ => Err(ImapClientError::Command(line.raw)),
    }
}

/// SELECT result: message count and optional UIDVALIDITY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectResult {
    pub exists: u32,
    pub uid_validity: Option<u32>,
}

/// One message summary from FETCH (flags, size, header bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub seq: u32,
    pub flags: Vec<String>,
    pub size: u32,
    pub header: Vec<u8>,
}

fn parse_fetch_summary(line: &str, literal: Option<&[u8]>) -> Option<FetchSummary> {
    let fetch_part = line.find(" FETCH (")?;
    let seq: u32 = line[1..fetch_part].trim().parse().ok()?;
    let mut flags = Vec::new();
    let mut size = 0u32;
    if let Some(open) = line.find("FLAGS (") {
        let rest = &line[open + 7..];
        let end = rest.find(')').unwrap_or(0);
        flags = rest[..end].split_whitespace().map(|s| s.to_string()).collect();
    }
    if let Some(open) = line.find("RFC822.SIZE ") {
        let rest = &line[open + 12..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        size = rest[..end].parse().unwrap_or(0);
    }
    let header = literal.map(|b| b.to_vec()).unwrap_or_default();
    Some(FetchSummary {
        seq,
        flags,
        size,
        header,
    })
}

fn parse_select(untagged: &[ImapLineWithLiteral]) -> SelectResult {
    let mut exists = 0u32;
    let mut uid_validity = None;
    for lwl in untagged {
        let Some(rest) = lwl.0.raw.strip_prefix("* ") else {
            continue;
        };
        if let Some(n) = rest.strip_suffix(" EXISTS") {
            if let Ok(n) = n.trim().parse::<u32>() {
                exists = n;
            }
        } else if let Some(bracket) = rest.find("[UIDVALIDITY ") {
            let after = &rest[bracket + 13..];
            uid_validity = after
                .split(|c: char| c == ']' || c.is_whitespace())
                .next()
                .and_then(|s| s.parse().ok());
        }
    }
    SelectResult {
        exists,
        uid_validity,
    }
}

/// Authenticated-state IMAP session over a plain or TLS stream.
pub struct ImapSession {
    stream: ClientStream,
    read_buf: Vec<u8>,
    tag_counter: u32,
}

impl ImapSession {
    /// Connect and read the `* OK` greeting.
    pub async fn connect(host: &str, port: u16, use_tls: bool) -> Result<Self, ImapClientError> {
        let stream = ClientStream::connect(host, port, use_tls).await?;
        let mut session = Self {
            stream,
            read_buf: Vec::with_capacity(4096),
            tag_counter: 0,
        };
        let (line, _) = read_imap_line(&mut session.stream, &mut session.read_buf).await?;
        if !line.starts_with("* OK") && !line.starts_with("* PREAUTH") {
            return Err(ImapClientError::Greeting(line));
        }
        Ok(session)
    }

    /// Next tag (A0001, A0002, ...).
    fn next_tag(&mut self) -> String {
        self.tag_counter = self.tag_counter % 9999 + 1;
        format!("A{:04}", self.tag_counter)
    }

    async fn command(
        &mut self,
        command: &str,
    ) -> Result<(Vec<ImapLineWithLiteral>, ImapLine), ImapClientError> {
        let tag = self.next_tag();
        send_command(&mut self.stream, &mut self.read_buf, &tag, command).await
    }

    /// LOGIN with quoted user and password.
    pub async fn login(&mut self, user: &str, password: &str) -> Result<(), ImapClientError> {
        tracing::debug!(user, "IMAP LOGIN");
        let cmd = format!("LOGIN {} {}", quote_string(user), quote_string(password));
        let (_, final_line) = self.command(&cmd).await?;
        expect_ok(final_line)
    }

    /// SELECT mailbox; returns exists (message count) and optional UIDVALIDITY.
    pub async fn select(&mut self, mailbox: &str) -> Result<SelectResult, ImapClientError> {
        let cmd = format!("SELECT {}", quote_string(mailbox));
        let (untagged, final_line) = self.command(&cmd).await?;
        expect_ok(final_line)?;
        Ok(parse_select(&untagged))
    }

    /// FETCH flags, size and full header for messages `start..=end`.
    pub async fn fetch_summaries(
        &mut self,
        start: u32,
        end: u32,
    ) -> Result<Vec<FetchSummary>, ImapClientError> {
        let cmd = format!("FETCH {}:{} (FLAGS RFC822.SIZE BODY.PEEK[HEADER])", start, end);
        let (untagged, final_line) = self.command(&cmd).await?;
        expect_ok(final_line)?;
        Ok(untagged
            .iter()
            .filter(|lwl| lwl.0.raw.contains(" FETCH ("))
            .filter_map(|lwl| {
                parse_fetch_summary(&lwl.0.raw, lwl.1.first().map(|v| v.as_slice()))
            })
            .collect())
    }

    /// LOGOUT; errors are ignored as the server closes the connection.
    pub async fn logout(&mut self) -> Result<(), ImapClientError> {
        let _ = self.command("LOGOUT").await;
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}
