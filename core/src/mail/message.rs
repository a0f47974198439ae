/*
 * message.rs
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

//! An outgoing message: addresses, subject, identity headers and a MIME body.
//! `to_rfc822` serializes it for SMTP DATA; Bcc is kept for the envelope only.

use chrono::{DateTime, FixedOffset, Local};

use crate::charset::Charset;
use crate::mime::builder::append_header;
use crate::mime::{encode_header_value, EmailAddress, MimePart};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientType {
    To,
    Cc,
    Bcc,
}

impl RecipientType {
    /// `TO`, `CC` or `BCC`, case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "TO" => Some(RecipientType::To),
            "CC" => Some(RecipientType::Cc),
            "BCC" => Some(RecipientType::Bcc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailMessage {
    from: Vec<EmailAddress>,
    reply_to: Vec<EmailAddress>,
    to: Vec<EmailAddress>,
    cc: Vec<EmailAddress>,
    bcc: Vec<EmailAddress>,
    subject: Option<String>,
    sent_date: Option<DateTime<FixedOffset>>,
    message_id: Option<String>,
    content_id: Option<String>,
    charset: Charset,
    body: MimePart,
}

impl MailMessage {
    /// Message with `body` and no addresses. Header text is encoded in `charset`.
    pub fn new(body: MimePart, charset: Charset) -> Self {
        Self {
            from: Vec::new(),
            reply_to: Vec::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: None,
            sent_date: None,
            message_id: None,
            content_id: None,
            charset,
            body,
        }
    }

    pub fn body(&self) -> &MimePart {
        &self.body
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = Some(subject.into());
    }

    pub fn from(&self) -> &[EmailAddress] {
        &self.from
    }

    pub fn set_from(&mut self, from: EmailAddress) {
        self.from = vec![from];
    }

    pub fn add_from(&mut self, from: &[EmailAddress]) {
        self.from.extend_from_slice(from);
    }

    pub fn reply_to(&self) -> &[EmailAddress] {
        &self.reply_to
    }

    pub fn set_reply_to(&mut self, reply_to: &[EmailAddress]) {
        self.reply_to = reply_to.to_vec();
    }

    fn list_mut(&mut self, kind: RecipientType) -> &mut Vec<EmailAddress> {
        match kind {
            RecipientType::To => &mut self.to,
            RecipientType::Cc => &mut self.cc,
            RecipientType::Bcc => &mut self.bcc,
        }
    }

    pub fn recipients(&self, kind: RecipientType) -> &[EmailAddress] {
        match kind {
            RecipientType::To => &self.to,
            RecipientType::Cc => &self.cc,
            RecipientType::Bcc => &self.bcc,
        }
    }

    /// Replace the recipients of `kind` with the single `addr`.
    pub fn set_recipient(&mut self, kind: RecipientType, addr: EmailAddress) {
        *self.list_mut(kind) = vec![addr];
    }

    pub fn add_recipients(&mut self, kind: RecipientType, addrs: &[EmailAddress]) {
        self.list_mut(kind).extend_from_slice(addrs);
    }

    /// Envelope recipients: To, then Cc, then Bcc addresses.
    pub fn all_recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(EmailAddress::address)
            .collect()
    }

    pub fn sent_date(&self) -> Option<DateTime<FixedOffset>> {
        self.sent_date
    }

    pub fn set_sent_date(&mut self, date: DateTime<FixedOffset>) {
        self.sent_date = Some(date);
    }

    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    /// Message-level Content-ID, written as given.
    pub fn set_content_id(&mut self, id: impl Into<String>) {
        self.content_id = Some(id.into());
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn set_message_id(&mut self, id: impl Into<String>) {
        self.message_id = Some(id.into());
    }

    /// RFC 5322 bytes: Date, From, Reply-To, To, Cc, Subject, Message-ID, Content-ID,
    /// MIME-Version, then the body entity. A missing date or Message-ID is generated.
    pub fn to_rfc822(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let date = self
            .sent_date
            .unwrap_or_else(|| Local::now().fixed_offset());
        append_header(&mut out, "Date", &date.to_rfc2822());
        self.append_addresses(&mut out, "From", &self.from);
        self.append_addresses(&mut out, "Reply-To", &self.reply_to);
        self.append_addresses(&mut out, "To", &self.to);
        self.append_addresses(&mut out, "Cc", &self.cc);
        if let Some(subject) = &self.subject {
            append_header(&mut out, "Subject", &encode_header_value(subject, self.charset));
        }
        let message_id = match &self.message_id {
            Some(id) => id.clone(),
            None => new_message_id(self.from.first().map(|a| a.domain.as_str())),
        };
        append_header(&mut out, "Message-ID", &message_id);
        if let Some(id) = &self.content_id {
            append_header(&mut out, "Content-ID", id);
        }
        append_header(&mut out, "MIME-Version", "1.0");
        self.body.write_to(&mut out);
        if !out.ends_with(b"\r\n") {
            out.extend_from_slice(b"\r\n");
        }
        out
    }

    fn append_addresses(&self, out: &mut Vec<u8>, name: &str, addrs: &[EmailAddress]) {
        if addrs.is_empty() {
            return;
        }
        let values: Vec<String> = addrs.iter().map(|a| a.to_header(self.charset)).collect();
        append_header(out, name, &values.join(", "));
    }
}

/// `<random.millis@domain>`; domain falls back to `localhost`.
pub fn new_message_id(domain: Option<&str>) -> String {
    let mut bytes = [0u8; 8];
    let random = match getrandom::getrandom(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(_) => u64::from(std::process::id()),
    };
    let millis = Local::now().timestamp_millis();
    let domain = domain.filter(|d| !d.is_empty()).unwrap_or("localhost");
    format!("<{:016x}.{}@{}>", random, millis, domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> EmailAddress {
        EmailAddress::parse_addr_spec(s).unwrap()
    }

    #[test]
    fn recipient_labels() {
        assert_eq!(RecipientType::from_label("cc"), Some(RecipientType::Cc));
        assert_eq!(RecipientType::from_label(" BCC "), Some(RecipientType::Bcc));
        assert_eq!(RecipientType::from_label("x"), None);
    }

    #[test]
    fn bcc_in_envelope_not_in_headers() {
        let mut msg = MailMessage::new(MimePart::text("plain", "hi", Charset::UsAscii), Charset::UsAscii);
        msg.set_from(addr("me@example.com").with_display_name(Some("Me")));
        msg.set_recipient(RecipientType::To, addr("a@example.com"));
        msg.add_recipients(RecipientType::Bcc, &[addr("hidden@example.com")]);
        msg.set_subject("Hello");
        msg.set_content_id("42.1");
        let raw = String::from_utf8(msg.to_rfc822()).unwrap();
        assert!(raw.contains("From: Me <me@example.com>\r\n"));
        assert!(raw.contains("To: <a@example.com>\r\n"));
        assert!(raw.contains("Subject: Hello\r\n"));
        assert!(raw.contains("Content-ID: 42.1\r\n"));
        assert!(raw.contains("Message-ID: <"));
        assert!(raw.contains("@example.com>\r\n"));
        assert!(!raw.contains("hidden@"));
        assert!(raw.ends_with("hi\r\n"));
        assert_eq!(
            msg.all_recipients(),
            vec!["a@example.com".to_string(), "hidden@example.com".to_string()]
        );
    }

    #[test]
    fn set_recipient_replaces() {
        let mut msg = MailMessage::new(MimePart::text("plain", "", Charset::UsAscii), Charset::UsAscii);
        msg.set_recipient(RecipientType::To, addr("a@x.org"));
        msg.set_recipient(RecipientType::To, addr("b@x.org"));
        assert_eq!(msg.recipients(RecipientType::To).len(), 1);
        assert_eq!(msg.recipients(RecipientType::To)[0].address(), "b@x.org");
    }

    #[test]
    fn non_ascii_subject_is_encoded() {
        let mut msg = MailMessage::new(MimePart::text("plain", "", Charset::Utf8), Charset::Utf8);
        msg.set_subject("Año nuevo");
        let raw = String::from_utf8(msg.to_rfc822()).unwrap();
        assert!(raw.contains("Subject: =?UTF-8?B?"));
    }
}
