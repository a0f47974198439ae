/*
 * bulk.rs
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

//! One message sent separately to each of many recipients, with a per-recipient
//! identifier and a plain-text progress report.

use std::collections::HashMap;
use std::io::Write;

use crate::mail::compose::ComposeRequest;
use crate::mail::message::{MailMessage, RecipientType};
use crate::mail::session::MailSession;
use crate::mail::MailError;
use crate::mime::EmailAddress;
use crate::xhtml::replacer::StreamReplacer;

const MESSAGE_ID_MARKER: &str = "{#message.id}";
const MESSAGE_ID_KEY: &str = "Message.id";

#[derive(Debug, Clone)]
pub struct BulkMessage {
    pub subject: Option<String>,
    pub from_personal: Option<String>,
    pub from_address: Option<String>,
    pub reply_address: Option<String>,
    pub recipients: Option<Vec<String>>,
    /// One type per recipient; a single entry applies to all; To when missing.
    pub recipient_types: Vec<RecipientType>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub encoding: Option<String>,
    pub id: Option<String>,
    pub attachments: Vec<String>,
    pub user_dir: Option<String>,
    pub inline_images: bool,
}

impl Default for BulkMessage {
    fn default() -> Self {
        Self {
            subject: None,
            from_personal: None,
            from_address: None,
            reply_address: None,
            recipients: None,
            recipient_types: Vec::new(),
            text_body: None,
            html_body: None,
            encoding: None,
            id: None,
            attachments: Vec::new(),
            user_dir: None,
            inline_images: true,
        }
    }
}

impl BulkMessage {
    fn recipient_type(&self, index: usize) -> RecipientType {
        match self.recipient_types.as_slice() {
            [] => RecipientType::To,
            [only] => *only,
            many => many.get(index).copied().unwrap_or(RecipientType::To),
        }
    }

    /// Either body contains the `{#Message.id}` marker (any case).
    fn uses_message_id(&self) -> bool {
        [&self.text_body, &self.html_body]
            .into_iter()
            .flatten()
            .any(|b| b.to_ascii_lowercase().contains(MESSAGE_ID_MARKER))
    }

    /// `{id}.{n}` for the n-th recipient (1-based); just `n` without an id.
    fn unique_id(&self, n: usize) -> String {
        match self.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => format!("{}.{}", id, n),
            None => n.to_string(),
        }
    }

    fn compose_request(&self, text: Option<String>, html: Option<String>, id: Option<String>) -> ComposeRequest {
        ComposeRequest {
            subject: self.subject.clone(),
            encoding: self.encoding.clone(),
            text_body: text,
            html_body: html,
            id,
            attachments: self.attachments.clone(),
            base_path: self.user_dir.clone(),
            inline_images: self.inline_images,
        }
    }
}

/// Marker keys are matched exactly, so every spelling found in the bodies maps to `id`.
fn id_map(bodies: &[Option<&str>], id: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert(MESSAGE_ID_KEY.to_string(), id.to_string());
    for body in bodies.iter().flatten() {
        let lower = body.to_ascii_lowercase();
        let mut from = 0;
        while let Some(at) = lower[from..].find(MESSAGE_ID_MARKER) {
            let start = from + at;
            let key = &body[start + 2..start + MESSAGE_ID_MARKER.len() - 1];
            map.insert(key.to_string(), id.to_string());
            from = start + MESSAGE_ID_MARKER.len();
        }
    }
    map
}

fn report(out: &mut Option<&mut dyn Write>, line: &str) -> Result<(), MailError> {
    if let Some(w) = out.as_mut() {
        writeln!(w, "{}", line)?;
    }
    Ok(())
}

impl MailSession {
    async fn send_copy(
        &mut self,
        msg: &mut MailMessage,
        from: &EmailAddress,
        reply_to: Option<&EmailAddress>,
        kind: RecipientType,
        addr: &str,
    ) -> Result<(), MailError> {
        let to = EmailAddress::parse_addr_spec(addr)
            .ok_or_else(|| MailError::InvalidAddress(addr.to_string()))?;
        msg.set_from(from.clone());
        if let Some(reply_to) = reply_to {
            msg.set_reply_to(std::slice::from_ref(reply_to));
        }
        msg.set_recipient(kind, to);
        self.send_message(msg).await
    }

    /// Send `bulk` to each recipient separately and report progress to `out`.
    /// Returns the number of messages sent. Blank recipients are skipped and count as failed.
    pub async fn send_bulk(
        &mut self,
        bulk: &BulkMessage,
        mut out: Option<&mut dyn Write>,
    ) -> Result<usize, MailError> {
        let from_address = bulk
            .from_address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| MailError::InvalidArgument("sender address is required".to_string()))?;
        let recipients = bulk
            .recipients
            .as_ref()
            .ok_or_else(|| MailError::InvalidArgument("recipient list is required".to_string()))?;
        let from = EmailAddress::parse_addr_spec(from_address)
            .ok_or_else(|| MailError::InvalidAddress(from_address.to_string()))?;
        let personal = bulk
            .from_personal
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| from.address());
        let from = from.with_display_name(Some(personal));
        let reply_to = match bulk.reply_address.as_deref().filter(|a| !a.trim().is_empty()) {
            Some(a) => Some(
                EmailAddress::parse_addr_spec(a)
                    .ok_or_else(|| MailError::InvalidAddress(a.to_string()))?,
            ),
            None => None,
        };

        let per_recipient = bulk.uses_message_id();
        let mut master: Option<MailMessage> = None;
        let mut replacer = StreamReplacer::new();
        let mut sent = 0usize;

        for (r, raw) in recipients.iter().enumerate() {
            let addr: String = raw.chars().filter(|c| !matches!(c, ' ' | '\t' | '\r' | '\n')).collect();
            if addr.is_empty() {
                tracing::warn!(index = r, "skipping blank recipient");
                continue;
            }
            let unique = bulk.unique_id(r + 1);
            let composed = if per_recipient {
                let mut map = id_map(&[bulk.text_body.as_deref(), bulk.html_body.as_deref()], &unique);
                let text = bulk.text_body.as_deref().map(|t| replacer.replace_str(t, &mut map));
                let html = bulk.html_body.as_deref().map(|h| replacer.replace_str(h, &mut map));
                self.compose_message(&bulk.compose_request(text, html, Some(unique.clone())))
                    .await
            } else {
                if master.is_none() {
                    let req = bulk.compose_request(bulk.text_body.clone(), bulk.html_body.clone(), bulk.id.clone());
                    master = Some(self.compose_message(&req).await?);
                }
                master
                    .clone()
                    .map(|mut copy| {
                        copy.set_content_id(unique.clone());
                        copy
                    })
                    .ok_or_else(|| MailError::InvalidArgument("message not composed".to_string()))
            };
            let result = match composed {
                Ok(mut msg) => {
                    self.send_copy(&mut msg, &from, reply_to.as_ref(), bulk.recipient_type(r), &addr)
                        .await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    sent += 1;
                    report(&mut out, &format!("OK {}", addr))?;
                }
                Err(e) => {
                    tracing::error!(recipient = %raw, error = %e, "bulk send failed");
                    report(&mut out, &format!("ERROR {} {}", raw, e))?;
                }
            }
        }

        let total = recipients.len();
        if sent == total {
            report(&mut out, &format!("Process successfully completed. {} messages sent", sent))?;
        } else {
            report(
                &mut out,
                &format!(
                    "Process finished with errors. {} messages successfully sent, {} messages failed",
                    sent,
                    total - sent
                ),
            )?;
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_types_expand() {
        let mut bulk = BulkMessage::default();
        assert_eq!(bulk.recipient_type(3), RecipientType::To);
        bulk.recipient_types = vec![RecipientType::Bcc];
        assert_eq!(bulk.recipient_type(3), RecipientType::Bcc);
        bulk.recipient_types = vec![RecipientType::Cc, RecipientType::Bcc];
        assert_eq!(bulk.recipient_type(1), RecipientType::Bcc);
        assert_eq!(bulk.recipient_type(2), RecipientType::To);
    }

    #[test]
    fn marker_detection_ignores_case() {
        let mut bulk = BulkMessage::default();
        assert!(!bulk.uses_message_id());
        bulk.html_body = Some("<a href='x?id={#MESSAGE.ID}'>".to_string());
        assert!(bulk.uses_message_id());
    }

    #[test]
    fn unique_ids() {
        let mut bulk = BulkMessage::default();
        assert_eq!(bulk.unique_id(2), "2");
        bulk.id = Some("news".to_string());
        assert_eq!(bulk.unique_id(2), "news.2");
    }

    #[test]
    fn id_map_covers_spellings() {
        let map = id_map(&[Some("a {#MESSAGE.ID} b {#Message.Id}"), None], "n.1");
        let mut replacer = StreamReplacer::new();
        let mut map = map;
        assert_eq!(
            replacer.replace_str("a {#MESSAGE.ID} b {#Message.Id} c {#Message.id}", &mut map),
            "a n.1 b n.1 c n.1"
        );
    }

    #[tokio::test]
    async fn missing_sender_or_recipients() {
        let mut session = MailSession::new();
        let bulk = BulkMessage {
            recipients: Some(vec!["a@example.com".to_string()]),
            ..Default::default()
        };
        assert!(matches!(
            session.send_bulk(&bulk, None).await,
            Err(MailError::InvalidArgument(_))
        ));
        let bulk = BulkMessage {
            from_address: Some("me@example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            session.send_bulk(&bulk, None).await,
            Err(MailError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn bad_addresses_are_reported() {
        let mut session = MailSession::new();
        let bulk = BulkMessage {
            from_address: Some("me@example.com".to_string()),
            recipients: Some(vec!["not-an-address".to_string(), " \t".to_string()]),
            text_body: Some("hello".to_string()),
            ..Default::default()
        };
        let mut out = Vec::new();
        let sent = session.send_bulk(&bulk, Some(&mut out)).await.unwrap();
        assert_eq!(sent, 0);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "ERROR not-an-address invalid address: not-an-address\n\
Process finished with errors. 0 messages successfully sent, 2 messages failed\n"
        );
    }
}
