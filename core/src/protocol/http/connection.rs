/*
 * connection.rs
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

//! One HTTP/1.1 exchange at a time over a client stream: writes the request, feeds reads
//! to the H1 parser and reports to a `ResponseHandler`.

use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::net::ClientStream;
use crate::protocol::http::h1::{H1ResponseHandler, ParseState, ResponseParser};
use crate::protocol::http::request::{Method, RequestBuilder};
use crate::protocol::http::response::Response;
use crate::protocol::http::ResponseHandler;

/// Idle time allowed between two reads of a response.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Bridges H1 parser callbacks to the connection state and the caller's ResponseHandler.
/// Status and headers are held until the connection has picked a body mode.
struct H1Driver<'a, H: ResponseHandler + ?Sized> {
    status: &'a mut Option<(u16, Option<String>)>,
    headers: &'a mut Vec<(String, String)>,
    handler: &'a mut H,
}

impl<H: ResponseHandler + ?Sized> H1ResponseHandler for H1Driver<'_, H> {
    fn status(&mut self, code: u16, reason: Option<&str>) {
        *self.status = Some((code, reason.map(|s| s.to_string())));
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn body_chunk(&mut self, data: &[u8]) {
        self.handler.body_chunk(data);
    }

    fn end_body(&mut self) {
        self.handler.end_body();
    }

    fn trailer(&mut self, name: &str, value: &str) {
        self.handler.header(name, value);
    }

    fn complete(&mut self) {
        self.handler.complete();
    }
}

/// HTTP/1.1 connection. Call `send()` to issue a request; the read loop runs until the response completes.
pub struct HttpConnection {
    stream: ClientStream,
    host: String,
    port: u16,
    secure: bool,
    read_buf: BytesMut,
    parser: ResponseParser,
    status: Option<(u16, Option<String>)>,
    headers: Vec<(String, String)>,
}

impl HttpConnection {
    /// Create from an already-connected stream. Used by HttpClient::connect().
    pub fn new(stream: ClientStream, host: String, port: u16, secure: bool) -> Self {
        Self {
            stream,
            host,
            port,
            secure,
            read_buf: BytesMut::with_capacity(8192),
            parser: ResponseParser::new(),
            status: None,
            headers: Vec::new(),
        }
    }

    /// Send the request and run the read loop until the response is complete.
    /// On error `handler.failed()` is called before the error is returned.
    pub async fn send<H: ResponseHandler + ?Sized>(
        &mut self,
        request: RequestBuilder,
        handler: &mut H,
    ) -> io::Result<()> {
        let result = self.send_http1(&request, handler).await;
        if let Err(ref e) = result {
            tracing::debug!(host = %self.host, path = %request.path, error = %e, "HTTP request failed");
            handler.failed(e);
        }
        result
    }

    async fn send_http1<H: ResponseHandler + ?Sized>(
        &mut self,
        request: &RequestBuilder,
        handler: &mut H,
    ) -> io::Result<()> {
        self.status = None;
        self.headers.clear();
        self.parser.reset();
        let head_request = request.method == Method::Head;

        self.write_http1_request(request).await?;

        loop {
            {
                let mut driver = H1Driver {
                    status: &mut self.status,
                    headers: &mut self.headers,
                    handler: &mut *handler,
                };
                self.parser.receive(&mut self.read_buf, &mut driver)?;
            }

            if self.parser.state() == ParseState::HeadersComplete {
                let (code, reason) = self.status.take().unwrap_or((0, None));
                if (100..200).contains(&code) && code != 101 {
                    // interim response; the final one follows
                    self.headers.clear();
                    self.parser.reset();
                    continue;
                }
                let content_length = self
                    .headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<u64>().ok());
                let chunked = self.headers.iter().any(|(k, v)| {
                    k.eq_ignore_ascii_case("transfer-encoding")
                        && v.to_ascii_lowercase().contains("chunked")
                });

                let response = match reason {
                    Some(r) => Response::with_reason(code, r),
                    None => Response::new(code),
                };
                if response.is_success() {
                    handler.ok(response);
                } else {
                    handler.error(response);
                }
                for (name, value) in &self.headers {
                    handler.header(name, value);
                }
                let no_body = head_request
                    || code == 204
                    || code == 304
                    || (100..200).contains(&code)
                    || (!chunked && content_length == Some(0));
                if no_body {
                    self.parser.set_no_body();
                    handler.complete();
                } else {
                    handler.start_body();
                    self.parser.set_body_mode(content_length, chunked);
                    // body bytes may already be buffered with the headers
                    continue;
                }
            }

            if self.parser.state() == ParseState::Idle {
                break;
            }

            let mut tmp = [0u8; 8192];
            let n = timeout(READ_TIMEOUT, self.stream.read(&mut tmp))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "HTTP read timed out"))??;
            if n == 0 {
                let mut driver = H1Driver {
                    status: &mut self.status,
                    headers: &mut self.headers,
                    handler: &mut *handler,
                };
                self.parser.finish(&mut driver)?;
                break;
            }
            self.read_buf.extend_from_slice(&tmp[..n]);
        }
        Ok(())
    }

    fn host_header(&self) -> String {
        if (self.secure && self.port != 443) || (!self.secure && self.port != 80) {
            format!("{}:{}", self.host, self.port)
        } else {
            self.host.clone()
        }
    }

    async fn write_http1_request(&mut self, request: &RequestBuilder) -> io::Result<()> {
        let use_chunked = request.body.is_some()
            && !request.has_header("Content-Length")
            && !request.has_header("Transfer-Encoding");
        let mut req = format!(
            "{} {} HTTP/1.1\r\n",
            request.method.as_str(),
            request.path
        );
        if !request.has_header("Host") {
            req.push_str("Host: ");
            req.push_str(&self.host_header());
            req.push_str("\r\n");
        }
        for (k, v) in &request.headers {
            req.push_str(k);
            req.push_str(": ");
            req.push_str(v);
            req.push_str("\r\n");
        }
        if !request.has_header("Connection") {
            req.push_str("Connection: keep-alive\r\n");
        }
        if use_chunked {
            req.push_str("Transfer-Encoding: chunked\r\n");
        }
        req.push_str("\r\n");
        self.stream.write_all(req.as_bytes()).await?;
        if let Some(body) = &request.body {
            if use_chunked {
                let hex_len = format!("{:x}\r\n", body.len());
                self.stream.write_all(hex_len.as_bytes()).await?;
                self.stream.write_all(body).await?;
                self.stream.write_all(b"\r\n").await?;
                self.stream.write_all(b"0\r\n\r\n").await?;
            } else {
                self.stream.write_all(body).await?;
            }
        }
        self.stream.flush().await?;
        Ok(())
    }
}
