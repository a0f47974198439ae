/*
 * handler.rs
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

//! HTTP response handler trait and a buffering implementation.
//!
//! Events: status → headers → start_body → body_chunk (×n) → end_body → trailer (×n) → complete / failed.

use crate::protocol::http::response::Response;

/// Handler for HTTP response events (push model). The connection drives this as data arrives.
///
/// Flow for a response with body:
/// 1. `ok(response)` or `error(response)`, status received
/// 2. `header(name, value)` for each response header
/// 3. `start_body()`
/// 4. `body_chunk(data)` for each chunk of body data
/// 5. `end_body()`
/// 6. `header(name, value)` for each trailer (if any)
/// 7. `complete()`
///
/// On connection or protocol failure only `failed(error)` is called.
pub trait ResponseHandler {
    /// Called when a 2xx status is received.
    fn ok(&mut self, response: Response);

    /// Called for any other status (3xx redirects included).
    fn error(&mut self, response: Response);

    /// Called for each response or trailer header. Name may repeat for multi-value headers.
    fn header(&mut self, name: &str, value: &str);

    /// Not called for HEAD responses, 204 or 304.
    fn start_body(&mut self);

    /// Data is only valid for the duration of the call.
    fn body_chunk(&mut self, data: &[u8]);

    fn end_body(&mut self);

    /// Called when the response is fully complete (after all headers and body).
    fn complete(&mut self);

    fn failed(&mut self, error: &std::io::Error);
}

/// Handler that keeps the whole response in memory.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    pub status: Option<Response>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub completed: bool,
    pub failure: Option<String>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code(&self) -> u16 {
        self.status.as_ref().map(|r| r.code).unwrap_or(0)
    }

    /// First header value with `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl ResponseHandler for BufferedResponse {
    fn ok(&mut self, response: Response) {
        self.status = Some(response);
    }
    fn error(&mut self, response: Response) {
        self.status = Some(response);
    }
    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
    fn start_body(&mut self) {}
    fn body_chunk(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }
    fn end_body(&mut self) {}
    fn complete(&mut self) {
        self.completed = true;
    }
    fn failed(&mut self, error: &std::io::Error) {
        self.failure = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let mut r = BufferedResponse::new();
        r.ok(Response::new(200));
        r.header("Set-Cookie", "a=1");
        r.header("set-cookie", "b=2");
        r.header("Content-Type", "text/html");
        assert_eq!(r.code(), 200);
        assert_eq!(r.header_value("content-type"), Some("text/html"));
        assert_eq!(r.header_values("SET-COOKIE").count(), 2);
    }
}
