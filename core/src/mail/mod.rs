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

//! Mail session: lazily connected store and transport, folder listings as XML summaries,
//! message composition from text/HTML bodies with inline images and attachments, bulk send.

pub mod authenticator;
pub mod bulk;
pub mod compose;
pub mod headers;
pub mod message;
pub mod session;
pub mod store;

use std::io;
use thiserror::Error;

use crate::protocol::imap::ImapClientError;
use crate::protocol::pop3::Pop3ClientError;
use crate::protocol::smtp::SmtpClientError;
use crate::web::HttpError;

pub use authenticator::Credentials;
pub use bulk::BulkMessage;
pub use compose::{compose_message, ComposeRequest};
pub use headers::MailHeaders;
pub use message::{MailMessage, RecipientType};
pub use session::MailSession;
pub use store::{Flag, MailStore, MessageSummary};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail session properties are not set")]
    NoProperties,
    #[error("mail host name is not set")]
    MissingHost,
    #[error("mail account name is not set")]
    MissingAccount,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("unsupported mail protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("unsupported charset: {0}")]
    Charset(String),
    #[error("no such folder: {0}")]
    NoSuchFolder(String),
    #[error("no message number {0}")]
    NoSuchMessage(u32),
    #[error(transparent)]
    Smtp(#[from] SmtpClientError),
    #[error(transparent)]
    Pop3(#[from] Pop3ClientError),
    #[error(transparent)]
    Imap(#[from] ImapClientError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
