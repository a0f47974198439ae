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

//! POP3 protocol client: connect, USER/PASS, STAT, UIDL, LIST, RETR, TOP, QUIT.

use crate::net::ClientStream;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// POP3 client error (network, protocol, auth).
#[derive(Debug, Error)]
pub enum Pop3ClientError {
    #[error(transparent)]
    Io(#[from] io::Error),
    /// `-ERR` or any reply that is not `+OK`.
    #[error("POP3 server error: {0}")]
    Server(String),
}

/// STAT response: message count and total size in octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatResponse {
    pub count: u32,
    pub total_size: u64,
}

/// UIDL list entry: message number and unique-id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidlEntry {
    pub msg_no: u32,
    pub uidl: String,
}

/// LIST entry: message number and size in octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntry {
    pub msg_no: u32,
    pub size: u64,
}

/// Read one line; returns the bytes without CRLF.
async fn read_line_bytes<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    buf.clear();
    loop {
        let mut b = [0u8; 1];
        let n = stream.read(&mut b).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
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

async fn read_line<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<String>
where
    S: AsyncRead + Unpin,
{
    read_line_bytes(stream, buf).await?;
    Ok(String::from_utf8_lossy(buf).trim_end().to_string())
}

async fn write_line<S>(stream: &mut S, line: &str) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await?;
    Ok(())
}

/// Read multi-line response (lines until "." alone). POP3 dot-stuffing: leading "." in content is sent as "..".
/// Bytes are kept as received; header charsets are resolved later.
async fn read_multiline<S>(stream: &mut S, buf: &mut Vec<u8>) -> Result<Vec<u8>, Pop3ClientError>
where
    S: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    loop {
        read_line_bytes(stream, buf).await?;
        if buf.as_slice() == b"." {
            break;
        }
        let to_append = if buf.starts_with(b".") { &buf[1..] } else { &buf[..] };
        out.extend_from_slice(to_append);
        out.extend_from_slice(b"\r\n");
    }
    Ok(out)
}

/// Collect the lines of a multi-line listing (LIST, UIDL).
async fn read_listing<S>(stream: &mut S, buf: &mut Vec<u8>) -> Result<Vec<String>, Pop3ClientError>
where
    S: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let line = read_line(stream, buf).await?;
        if line == "." {
            return Ok(lines);
        }
        lines.push(line);
    }
}

fn check_ok(line: &str) -> Result<(), Pop3ClientError> {
    if line.starts_with("+OK") {
        Ok(())
    } else {
        let text = line.strip_prefix("-ERR").unwrap_or(line).trim();
        Err(Pop3ClientError::Server(text.to_string()))
    }
}

fn parse_list_entry(line: &str) -> Option<ListEntry> {
    let mut sp = line.split_whitespace();
    let msg_no = sp.next()?.parse().ok()?;
    let size = sp.next()?.parse().ok()?;
    Some(ListEntry { msg_no, size })
}

/// POP3 session (connected stream). Call login, then STAT/UIDL/LIST/RETR/TOP, then quit.
pub struct Pop3Session {
    stream: ClientStream,
    read_buf: Vec<u8>,
}

impl Pop3Session {
    pub async fn connect(host: &str, port: u16, use_tls: bool) -> io::Result<Self> {
        let stream = ClientStream::connect(host, port, use_tls).await?;
        Ok(Self {
            stream,
            read_buf: Vec::with_capacity(4096),
        })
    }

    /// Read greeting (+OK ... or -ERR).
    pub async fn read_greeting(&mut self) -> Result<(), Pop3ClientError> {
        let line = read_line(&mut self.stream, &mut self.read_buf).await?;
        check_ok(&line)
    }

    async fn command(&mut self, cmd: &str) -> Result<String, Pop3ClientError> {
        write_line(&mut self.stream, cmd).await?;
        let line = read_line(&mut self.stream, &mut self.read_buf).await?;
        check_ok(&line)?;
        Ok(line)
    }

    /// USER then PASS.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), Pop3ClientError> {
        tracing::debug!(user = username, "POP3 USER");
        self.command(&format!("USER {}", username)).await?;
        self.command(&format!("PASS {}", password)).await?;
        Ok(())
    }

    /// STAT -> count and total size.
    pub async fn stat(&mut self) -> Result<StatResponse, Pop3ClientError> {
        let line = self.command("STAT").await?;
        // +OK count size
        let rest = line.strip_prefix("+OK").map(|s| s.trim()).unwrap_or("");
        let mut parts = rest.split_whitespace();
        let count = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0u32);
        let total_size = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0u64);
        Ok(StatResponse { count, total_size })
    }

    /// UIDL for every message.
    pub async fn uidl(&mut self) -> Result<Vec<UidlEntry>, Pop3ClientError> {
        self.command("UIDL").await?;
        let lines = read_listing(&mut self.stream, &mut self.read_buf).await?;
        Ok(lines
            .iter()
            .filter_map(|line| {
                let (no, id) = line.split_once(' ')?;
                Some(UidlEntry {
                    msg_no: no.parse().ok()?,
                    uidl: id.trim().to_string(),
                })
            })
            .collect())
    }

    /// LIST for every message: (msg_no, size).
    pub async fn list(&mut self) -> Result<Vec<ListEntry>, Pop3ClientError> {
        self.command("LIST").await?;
        let lines = read_listing(&mut self.stream, &mut self.read_buf).await?;
        Ok(lines.iter().filter_map(|l| parse_list_entry(l)).collect())
    }

    /// LIST msg: single-line scan listing.
    pub async fn list_one(&mut self, msg_no: u32) -> Result<ListEntry, Pop3ClientError> {
        let line = self.command(&format!("LIST {}", msg_no)).await?;
        let rest = line.strip_prefix("+OK").unwrap_or("").trim();
        parse_list_entry(rest).ok_or(Pop3ClientError::Server(line.clone()))
    }

    /// RETR msg -> full message bytes.
    pub async fn retr(&mut self, msg_no: u32) -> Result<Vec<u8>, Pop3ClientError> {
        self.command(&format!("RETR {}", msg_no)).await?;
        read_multiline(&mut self.stream, &mut self.read_buf).await
    }

    /// TOP msg n -> headers plus first n lines of body. n=0 for headers only.
    pub async fn top(&mut self, msg_no: u32, n: u32) -> Result<Vec<u8>, Pop3ClientError> {
        self.command(&format!("TOP {} {}", msg_no, n)).await?;
        read_multiline(&mut self.stream, &mut self.read_buf).await
    }

    /// QUIT. Errors are ignored; the server may already have closed.
    pub async fn quit(&mut self) -> Result<(), Pop3ClientError> {
        let _ = write_line(&mut self.stream, "QUIT").await;
        let _ = read_line(&mut self.stream, &mut self.read_buf).await;
        Ok(())
    }
}
