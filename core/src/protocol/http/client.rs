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

//! Opens HTTP connections.

use std::io;

use crate::net::ClientStream;
use crate::protocol::http::connection::HttpConnection;

pub struct HttpClient;

impl HttpClient {
    /// Connect to `host:port`, with a TLS handshake when `use_tls` is set.
    pub async fn connect(host: &str, port: u16, use_tls: bool) -> io::Result<HttpConnection> {
        let stream = ClientStream::connect_http(host, port, use_tls).await?;
        tracing::debug!(host, port, use_tls, "HTTP connected");
        Ok(HttpConnection::new(stream, host.to_string(), port, use_tls))
    }
}
