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

//! HTTP/1.1 transport for the page fetcher. Responses are push-parsed into a
//! `ResponseHandler`; `BufferedResponse` collects status, headers and body for callers
//! that want the whole thing.

mod handler;
mod request;
mod response;

pub mod h1;

pub use handler::{BufferedResponse, ResponseHandler};
pub use h1::H1ResponseHandler;
pub use request::{Method, RequestBuilder, UnknownMethod};
pub use response::Response;

pub mod client;
pub mod connection;

pub use client::HttpClient;
pub use connection::HttpConnection;
