/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked or until close).

use bytes::Buf;
use bytes::BytesMut;
use std::io;

/// Callback for HTTP/1.1 response events. The connection implements this and forwards to ResponseHandler.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn end_body(&mut self);
    fn trailer(&mut self, name: &str, value: &str);
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Idle,
    StatusLine,
    Headers,
    /// Headers done; the connection must call `set_body_mode()` or `set_no_body()`.
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    ChunkTrailer,
}

/// Push parser for one HTTP/1.1 response. Feed bytes via `receive`.
pub struct ResponseParser {
    state: ParseState,
    /// Content-Length when known; None while reading until close or chunked.
    content_length: Option<u64>,
    bytes_received: u64,
    chunk_remaining: u64,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            content_length: None,
            bytes_received: 0,
            chunk_remaining: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// True while the body is delimited by connection close.
    pub fn reads_until_close(&self) -> bool {
        self.state == ParseState::Body && self.content_length.is_none()
    }

    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    fn split_field(line: &str) -> Option<(&str, &str)> {
        let colon = line.find(':')?;
        Some((line[..colon].trim(), line[colon + 1..].trim()))
    }

    /// Parse as much as possible from `buf`. Partial tokens stay in `buf`.
    /// Returns at `HeadersComplete` so the connection can pick the body mode.
    pub fn receive<H: H1ResponseHandler>(
        &mut self,
        buf: &mut BytesMut,
        handler: &mut H,
    ) -> Result<(), io::Error> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let Some(line_end) = Self::find_crlf(buf) else {
                        return Ok(());
                    };
                    let line = buf.split_to(line_end + 2);
                    let line_str = String::from_utf8_lossy(&line[..line_end]);
                    if line_str.is_empty() {
                        // stray CRLF between responses
                        continue;
                    }
                    // HTTP/1.1 200 OK or HTTP/1.1 200
                    let mut parts = line_str.splitn(3, ' ');
                    let version = parts.next().unwrap_or("");
                    if !version.starts_with("HTTP/") {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "invalid HTTP status line",
                        ));
                    }
                    let code = parts
                        .next()
                        .and_then(|s| s.parse::<u16>().ok())
                        .ok_or_else(|| {
                            io::Error::new(io::ErrorKind::InvalidData, "invalid status code")
                        })?;
                    handler.status(code, parts.next());
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line_end) = Self::find_crlf(buf) else {
                        return Ok(());
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    let line = buf.split_to(line_end + 2);
                    // Header bytes are ISO-8859-1 on the wire.
                    let line_str: String = line[..line_end].iter().map(|&b| b as char).collect();
                    if let Some((name, value)) = Self::split_field(&line_str) {
                        handler.header(name, value);
                    }
                }
                ParseState::HeadersComplete | ParseState::Idle => return Ok(()),
                ParseState::Body => match self.content_length {
                    Some(length) => {
                        let remaining = (length - self.bytes_received) as usize;
                        let to_read = remaining.min(buf.len());
                        if to_read > 0 {
                            let chunk = buf.split_to(to_read);
                            handler.body_chunk(&chunk);
                            self.bytes_received += to_read as u64;
                        }
                        if self.bytes_received >= length {
                            handler.end_body();
                            handler.complete();
                            self.state = ParseState::Idle;
                        }
                    }
                    None => {
                        let chunk = buf.split_to(buf.len());
                        handler.body_chunk(&chunk);
                        return Ok(());
                    }
                },
                ParseState::ChunkSize => {
                    let Some(line_end) = Self::find_crlf(buf) else {
                        return Ok(());
                    };
                    let line = buf.split_to(line_end + 2);
                    let line_str = String::from_utf8_lossy(&line[..line_end]);
                    let hex_part = line_str.split(';').next().unwrap_or("").trim();
                    self.chunk_remaining = u64::from_str_radix(hex_part, 16).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid chunk size")
                    })?;
                    self.state = if self.chunk_remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    let to_read = (self.chunk_remaining as usize).min(buf.len());
                    if to_read > 0 {
                        let chunk = buf.split_to(to_read);
                        handler.body_chunk(&chunk);
                        self.chunk_remaining -= to_read as u64;
                    }
                    if self.chunk_remaining > 0 || buf.len() < 2 {
                        return Ok(());
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let Some(line_end) = Self::find_crlf(buf) else {
                        return Ok(());
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        handler.end_body();
                        handler.complete();
                        self.state = ParseState::Idle;
                    } else {
                        let line = buf.split_to(line_end + 2);
                        let line_str = String::from_utf8_lossy(&line[..line_end]);
                        if let Some((name, value)) = Self::split_field(&line_str) {
                            handler.trailer(name, value);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Choose the body framing after `HeadersComplete`. Chunked wins over Content-Length.
    pub fn set_body_mode(&mut self, content_length: Option<u64>, chunked: bool) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        self.bytes_received = 0;
        if chunked {
            self.content_length = None;
            self.state = ParseState::ChunkSize;
        } else {
            self.content_length = content_length;
            self.state = ParseState::Body;
        }
    }

    /// The response has no body (HEAD, 1xx, 204, 304, Content-Length: 0).
    pub fn set_no_body(&mut self) {
        if self.state == ParseState::HeadersComplete {
            self.state = ParseState::Idle;
        }
    }

    /// Connection closed. Ends a read-until-close body; any other unfinished state is an error.
    pub fn finish<H: H1ResponseHandler>(&mut self, handler: &mut H) -> Result<(), io::Error> {
        match self.state {
            ParseState::Idle => Ok(()),
            ParseState::Body if self.content_length.is_none() => {
                handler.end_body();
                handler.complete();
                self.state = ParseState::Idle;
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "HTTP connection closed mid-response",
            )),
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Events {
        status: Option<u16>,
        headers: Vec<(String, String)>,
        trailers: Vec<(String, String)>,
        body: Vec<u8>,
        ended: bool,
        completed: bool,
    }

    impl H1ResponseHandler for Events {
        fn status(&mut self, code: u16, _reason: Option<&str>) {
            self.status = Some(code);
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.push((name.to_string(), value.to_string()));
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn end_body(&mut self) {
            self.ended = true;
        }
        fn trailer(&mut self, name: &str, value: &str) {
            self.trailers.push((name.to_string(), value.to_string()));
        }
        fn complete(&mut self) {
            self.completed = true;
        }
    }

    #[test]
    fn content_length_body_in_same_buffer() {
        let mut p = ResponseParser::new();
        let mut ev = Events::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello"[..]);
        p.receive(&mut buf, &mut ev).unwrap();
        assert_eq!(p.state(), ParseState::HeadersComplete);
        p.set_body_mode(Some(5), false);
        p.receive(&mut buf, &mut ev).unwrap();
        assert_eq!(ev.status, Some(200));
        assert_eq!(ev.body, b"hello");
        assert!(ev.completed);
        assert_eq!(p.state(), ParseState::Idle);
    }

    #[test]
    fn chunked_split_across_reads() {
        let mut p = ResponseParser::new();
        let mut ev = Events::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWi"[..]);
        p.receive(&mut buf, &mut ev).unwrap();
        p.set_body_mode(None, true);
        p.receive(&mut buf, &mut ev).unwrap();
        buf.extend_from_slice(b"ki\r\n5;ext=1\r\npedia\r\n0\r\nX-Check: 1\r\n\r\n");
        p.receive(&mut buf, &mut ev).unwrap();
        assert_eq!(ev.body, b"Wikipedia");
        assert_eq!(ev.trailers, vec![("X-Check".to_string(), "1".to_string())]);
        assert!(ev.completed);
    }

    #[test]
    fn read_until_close() {
        let mut p = ResponseParser::new();
        let mut ev = Events::default();
        let mut buf = BytesMut::from(&b"HTTP/1.0 200 OK\r\n\r\nabc"[..]);
        p.receive(&mut buf, &mut ev).unwrap();
        p.set_body_mode(None, false);
        assert!(p.reads_until_close());
        p.receive(&mut buf, &mut ev).unwrap();
        assert!(!ev.completed);
        p.finish(&mut ev).unwrap();
        assert!(ev.ended && ev.completed);
        assert_eq!(ev.body, b"abc");
    }

    #[test]
    fn eof_mid_content_length_is_error() {
        let mut p = ResponseParser::new();
        let mut ev = Events::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc"[..]);
        p.receive(&mut buf, &mut ev).unwrap();
        p.set_body_mode(Some(10), false);
        p.receive(&mut buf, &mut ev).unwrap();
        assert!(p.finish(&mut ev).is_err());
    }

    #[test]
    fn rejects_non_http() {
        let mut p = ResponseParser::new();
        let mut ev = Events::default();
        let mut buf = BytesMut::from(&b"SSH-2.0-OpenSSH\r\n"[..]);
        assert!(p.receive(&mut buf, &mut ev).is_err());
    }
}
