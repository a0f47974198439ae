/*
 * lib.rs
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

//! Ritagli core: utilities for web applications.
//!
//! - `web`: page fetcher with redirects and cookies, cookie lookup, page inspection
//! - `mail`: mail session over POP3, IMAP or mbox and SMTP; message composition; bulk send
//! - `xhtml`: HTML entities and text, placeholder replacement, XML node editing,
//!   stylesheet and LESS caches, well-formedness validation
//! - `protocol`, `mime`, `sasl`, `net`: the HTTP and mail clients underneath

pub mod charset;
pub mod config;
pub mod mail;
pub mod mime;
pub mod net;
pub mod protocol;
pub mod sasl;
pub mod web;
pub mod xhtml;

pub use config::{ConfigError, Properties};
pub use mail::{MailError, MailSession};
pub use web::{HttpError, HttpRequest};
pub use xhtml::{StylesheetCache, XmlDocument};
