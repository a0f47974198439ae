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

//! MIME support for composing and summarising mail: transfer encodings, encoded words,
//! RFC 5322 addresses and dates, header blocks and the entity tree writer.

pub mod base64;
pub mod builder;
pub mod headers;
pub mod quoted_printable;
pub mod rfc2047;
pub mod rfc5322;

pub use builder::{DispositionKind, MimePart, TransferEncoding};
pub use headers::HeaderBlock;
pub use rfc2047::{decode_encoded_words, encode_header_value};
pub use rfc5322::{
    format_mailbox, parse_email_address_list, parse_received_date, parse_rfc5322_date,
    EmailAddress,
};
