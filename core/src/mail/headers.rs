/*
 * headers.rs
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

//! Per-message header summary used by folder listings, and its `<msg>` XML form.

use chrono::{DateTime, FixedOffset};
use quick_xml::escape::escape;

use crate::mail::MessageSummary;
use crate::mime::headers::primary_value;
use crate::mime::{parse_email_address_list, parse_received_date, parse_rfc5322_date, HeaderBlock};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailHeaders {
    pub num: u32,
    pub id: String,
    pub content_type: String,
    pub disposition: String,
    /// Size in bytes.
    pub len: u64,
    pub priority: String,
    pub spam: String,
    pub subject: String,
    pub sent: Option<DateTime<FixedOffset>>,
    pub received: Option<DateTime<FixedOffset>>,
    pub from: String,
    pub to: String,
    /// Size in KB, rounded up.
    pub size_kb: u64,
    pub error: Option<String>,
}

impl MailHeaders {
    pub fn from_summary(summary: &MessageSummary) -> Self {
        let headers = summary.headers();
        let mut out = Self::from_header_block(summary.num, &headers, summary.size);
        if headers.is_empty() {
            out.error = Some("message has no headers".to_string());
        }
        out
    }

    pub fn from_header_block(num: u32, headers: &HeaderBlock, size: u64) -> Self {
        let text = |name: &str| headers.get(name).unwrap_or("").to_string();
        Self {
            num,
            id: text("Message-ID"),
            content_type: headers
                .get("Content-Type")
                .map(primary_value)
                .unwrap_or_else(|| "text/plain".to_string()),
            disposition: headers.get("Content-Disposition").map(primary_value).unwrap_or_default(),
            len: size,
            priority: text("X-Priority"),
            spam: text("X-Spam-Flag"),
            subject: headers.get_decoded("Subject").unwrap_or_default(),
            sent: headers.get("Date").and_then(parse_rfc5322_date),
            received: headers.get_all("Received").last().and_then(parse_received_date),
            from: first_personal(headers, "From"),
            to: all_personal(headers, "To"),
            size_kb: size.div_ceil(1024),
            error: None,
        }
    }

    /// `X-Spam-Flag: YES`, case-insensitive.
    pub fn is_spam(&self) -> bool {
        self.spam.trim().eq_ignore_ascii_case("YES")
    }

    pub fn to_xml(&self) -> String {
        let date = |d: &Option<DateTime<FixedOffset>>| {
            d.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default()
        };
        let mut xml = String::with_capacity(512);
        xml.push_str("<msg>");
        element(&mut xml, "num", &self.num.to_string());
        element(&mut xml, "id", &self.id);
        element(&mut xml, "type", &self.content_type);
        element(&mut xml, "disposition", &self.disposition);
        element(&mut xml, "len", &self.len.to_string());
        element(&mut xml, "priority", &self.priority);
        element(&mut xml, "spam", &self.spam);
        cdata_element(&mut xml, "subject", &self.subject);
        element(&mut xml, "sent", &date(&self.sent));
        element(&mut xml, "received", &date(&self.received));
        cdata_element(&mut xml, "from", &self.from);
        cdata_element(&mut xml, "to", &self.to);
        element(&mut xml, "size", &self.size_kb.to_string());
        element(&mut xml, "err", self.error.as_deref().unwrap_or(""));
        xml.push_str("</msg>");
        xml
    }
}

fn decoded_addresses(headers: &HeaderBlock, name: &str) -> Vec<String> {
    let Some(value) = headers.get(name) else {
        return Vec::new();
    };
    match parse_email_address_list(value) {
        Some(list) => list
            .iter()
            .map(|a| crate::mime::decode_encoded_words(&a.personal_or_address()))
            .collect(),
        None => vec![crate::mime::decode_encoded_words(value)],
    }
}

fn first_personal(headers: &HeaderBlock, name: &str) -> String {
    decoded_addresses(headers, name)
        .into_iter()
        .next()
        .unwrap_or_default()
}

fn all_personal(headers: &HeaderBlock, name: &str) -> String {
    decoded_addresses(headers, name).join(", ")
}

fn element(xml: &mut String, name: &str, value: &str) {
    xml.push('<');
    xml.push_str(name);
    xml.push('>');
    xml.push_str(&escape(value));
    xml.push_str("</");
    xml.push_str(name);
    xml.push('>');
}

/// CDATA section; `]]>` in the value is split across two sections.
fn cdata_element(xml: &mut String, name: &str, value: &str) {
    xml.push('<');
    xml.push_str(name);
    xml.push_str("><![CDATA[");
    xml.push_str(&value.replace("]]>", "]]]]><![CDATA[>"));
    xml.push_str("]]></");
    xml.push_str(name);
    xml.push('>');
}
