/*
 * compose.rs
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

//! Builds a `MailMessage` from text and HTML bodies: HTML goes out as
//! multipart/alternative with a plain-text rendition, `<img>` sources can be embedded
//! as related parts referenced by `cid:`, and files are attached as octet streams.

use std::path::Path;

use crate::charset::Charset;
use crate::mail::{MailError, MailMessage};
use crate::mime::{DispositionKind, MimePart};
use crate::web::{Body, HttpRequest};
use crate::xhtml::html_text::{extract_text, image_sources};

const DEFAULT_ENCODING: &str = "ASCII";
const ATTACHMENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub subject: Option<String>,
    /// Charset label for bodies and headers; ASCII when None.
    pub encoding: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    /// Content-ID of the message; ignored when blank.
    pub id: Option<String>,
    /// File paths, relative to `base_path` unless they already start with it.
    pub attachments: Vec<String>,
    pub base_path: Option<String>,
    /// Embed `<img>` sources of the HTML body as related parts.
    pub inline_images: bool,
}

impl Default for ComposeRequest {
    fn default() -> Self {
        Self {
            subject: None,
            encoding: None,
            text_body: None,
            html_body: None,
            id: None,
            attachments: Vec::new(),
            base_path: None,
            inline_images: true,
        }
    }
}

impl ComposeRequest {
    pub fn charset(&self) -> Result<Charset, MailError> {
        let label = self.encoding.as_deref().unwrap_or(DEFAULT_ENCODING);
        Charset::from_label(label).ok_or_else(|| MailError::Charset(label.to_string()))
    }
}

pub async fn compose_message(req: &ComposeRequest) -> Result<MailMessage, MailError> {
    let charset = req.charset()?;
    let base_path = req.base_path.as_deref().unwrap_or("");

    let content = match &req.html_body {
        Some(html) => {
            let text = match &req.text_body {
                Some(t) => t.clone(),
                None => extract_text(html),
            };
            let plain = MimePart::text("plain", &text, charset)
                .with_disposition(DispositionKind::Inline, None);
            let html_part = html_with_images(html, req.inline_images, base_path, charset).await?;
            MimePart::multipart("alternative", vec![plain, html_part])
        }
        None => {
            let text = req.text_body.as_deref().unwrap_or("");
            let plain = MimePart::text("plain", text, charset);
            if req.attachments.is_empty() {
                plain
            } else {
                plain.with_disposition(DispositionKind::Inline, None)
            }
        }
    };

    let body = if req.attachments.is_empty() {
        content
    } else {
        let mut parts = vec![content];
        for file in &req.attachments {
            parts.push(attachment_part(file, base_path).await?);
        }
        MimePart::multipart("mixed", parts)
    };

    let mut msg = MailMessage::new(body, charset);
    if let Some(subject) = &req.subject {
        msg.set_subject(subject.as_str());
    }
    if let Some(id) = req.id.as_deref().filter(|id| !id.trim().is_empty()) {
        msg.set_content_id(id);
    }
    Ok(msg)
}

/// HTML part, wrapped in multipart/related when images were embedded.
async fn html_with_images(
    html: &str,
    inline_images: bool,
    base_path: &str,
    charset: Charset,
) -> Result<MimePart, MailError> {
    if !inline_images {
        return Ok(MimePart::text("html", html, charset)
            .with_disposition(DispositionKind::Inline, None));
    }
    let mut images: Vec<(String, String)> = Vec::new();
    for src in image_sources(html) {
        if !images.iter().any(|(s, _)| *s == src) {
            let cid = content_id_for(&src).to_string();
            images.push((src, cid));
        }
    }
    let html = point_sources_at_cids(html, &images);
    let html_part = MimePart::text("html", &html, charset)
        .with_disposition(DispositionKind::Inline, None);
    if images.is_empty() {
        return Ok(html_part);
    }
    let mut parts = vec![html_part];
    for (src, cid) in &images {
        let bytes = image_bytes(src, base_path).await?;
        parts.push(
            MimePart::binary(image_type(cid), bytes)
                .with_disposition(DispositionKind::Inline, Some(cid))
                .with_content_id(cid),
        );
    }
    Ok(MimePart::multipart("related", parts))
}

/// Rewrites each `src` attribute whose whole value is one of `images` to `cid:<id>`.
/// Other text, including other attributes that mention the same path, is left alone.
fn point_sources_at_cids(html: &str, images: &[(String, String)]) -> String {
    let lower = html.to_ascii_lowercase();
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut copied = 0;
    let mut from = 0;
    while let Some(at) = lower[from..].find("src") {
        let start = from + at;
        from = start + 3;
        if start == 0 || !bytes[start - 1].is_ascii_whitespace() {
            continue;
        }
        let Some(rest) = html[from..].trim_start().strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let mut value_start = html.len() - rest.len();
        let value_end = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => {
                value_start += 1;
                match html[value_start..].find(q) {
                    Some(len) => value_start + len,
                    None => break,
                }
            }
            _ => {
                let len = rest
                    .find(|c: char| c.is_ascii_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                value_start + len
            }
        };
        let value = &html[value_start..value_end];
        if let Some((_, cid)) = images.iter().find(|(src, _)| src == value) {
            out.push_str(&html[copied..value_start]);
            out.push_str("cid:");
            out.push_str(cid);
            copied = value_end;
        }
        from = value_end;
    }
    out.push_str(&html[copied..]);
    out
}

/// Text after the last `/` of an image source.
fn content_id_for(src: &str) -> &str {
    src.rsplit_once('/').map_or(src, |(_, name)| name)
}

async fn image_bytes(src: &str, base_path: &str) -> Result<Vec<u8>, MailError> {
    let url = if src.starts_with("www.") {
        format!("http://{}", src)
    } else {
        src.to_string()
    };
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        let mut req = HttpRequest::new(url);
        let bytes = match req.get().await? {
            Body::Bytes(b) => b.clone(),
            Body::Text(t) => t.clone().into_bytes(),
        };
        tracing::debug!(src, len = bytes.len(), "fetched inline image");
        Ok(bytes)
    } else {
        Ok(tokio::fs::read(format!("{}{}", base_path, src)).await?)
    }
}

async fn attachment_part(file: &str, base_path: &str) -> Result<MimePart, MailError> {
    let path = if !base_path.is_empty() && file.starts_with(base_path) {
        file.to_string()
    } else {
        format!("{}{}", base_path, file)
    };
    let bytes = tokio::fs::read(&path).await?;
    let name = Path::new(&path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());
    Ok(MimePart::binary(ATTACHMENT_TYPE, bytes)
        .with_disposition(DispositionKind::Attachment, Some(&name)))
}

fn image_type(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        _ => ATTACHMENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::builder::{Disposition, PartBody};

    fn rendered(msg: &MailMessage) -> String {
        String::from_utf8(msg.to_rfc822()).unwrap()
    }

    #[test]
    fn content_ids_and_types() {
        assert_eq!(content_id_for("img/logo.png"), "logo.png");
        assert_eq!(content_id_for("logo.png"), "logo.png");
        assert_eq!(content_id_for("http://x.org/a/"), "");
        assert_eq!(image_type("A.JPG"), "image/jpeg");
        assert_eq!(image_type("noext"), ATTACHMENT_TYPE);
    }

    #[tokio::test]
    async fn plain_text_only() {
        let req = ComposeRequest {
            subject: Some("Hi".to_string()),
            text_body: Some("Hello".to_string()),
            id: Some("  ".to_string()),
            ..Default::default()
        };
        let msg = compose_message(&req).await.unwrap();
        assert_eq!(msg.body().content_type, "text/plain; charset=US-ASCII");
        assert!(msg.body().disposition.is_none());
        assert_eq!(msg.subject(), Some("Hi"));
        assert_eq!(msg.content_id(), None);
    }

    #[tokio::test]
    async fn html_with_local_images_and_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let base = format!("{}/", dir.path().display());
        std::fs::create_dir(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/logo.png"), b"\x89PNG").unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"%PDF").unwrap();
        let html = r#"<html><body><p>Hi there</p><img src="img/logo.png"><img src="img/logo.png"></body></html>"#;
        let req = ComposeRequest {
            html_body: Some(html.to_string()),
            id: Some("42".to_string()),
            attachments: vec!["report.pdf".to_string()],
            base_path: Some(base.clone()),
            encoding: Some("UTF-8".to_string()),
            ..Default::default()
        };
        let msg = compose_message(&req).await.unwrap();
        assert_eq!(msg.content_id(), Some("42"));
        let mixed = msg.body();
        assert_eq!(mixed.content_type, "multipart/mixed");
        let alternative = &mixed.parts()[0];
        assert_eq!(alternative.content_type, "multipart/alternative");
        let plain = &alternative.parts()[0];
        assert_eq!(plain.content(), Some(&b"Hi there"[..]));
        let related = &alternative.parts()[1];
        assert_eq!(related.content_type, "multipart/related");
        assert_eq!(related.parts().len(), 2);
        let html_part = String::from_utf8(related.parts()[0].content().unwrap().to_vec()).unwrap();
        assert_eq!(html_part.matches("src=\"cid:logo.png\"").count(), 2);
        let image = &related.parts()[1];
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.content_id.as_deref(), Some("logo.png"));
        let attachment = &mixed.parts()[1];
        assert_eq!(
            attachment.disposition,
            Some(Disposition {
                kind: DispositionKind::Attachment,
                filename: Some("report.pdf".to_string()),
            })
        );
        assert!(matches!(attachment.body, PartBody::Leaf { ref content, .. } if content == b"%PDF"));

        // An attachment path that already carries the base path is used as is.
        let again = ComposeRequest {
            text_body: Some("x".to_string()),
            attachments: vec![format!("{}report.pdf", base)],
            base_path: Some(base),
            ..Default::default()
        };
        let msg = compose_message(&again).await.unwrap();
        assert!(rendered(&msg).contains("filename=\"report.pdf\""));
    }

    #[test]
    fn only_whole_source_values_are_rewritten() {
        let images = vec![
            ("logo.png".to_string(), "logo.png".to_string()),
            ("a/logo.png".to_string(), "logo.png".to_string()),
            ("b.gif".to_string(), "b.gif".to_string()),
        ];
        let html = r#"<p>see logo.png</p><img src="a/logo.png" alt="logo.png"><IMG SRC='logo.png'><img src=b.gif><img data-src="b.gif">"#;
        assert_eq!(
            point_sources_at_cids(html, &images),
            r#"<p>see logo.png</p><img src="cid:logo.png" alt="logo.png"><IMG SRC='cid:logo.png'><img src=cid:b.gif><img data-src="b.gif">"#
        );
        assert_eq!(point_sources_at_cids("<img src=\"x.png", &images), "<img src=\"x.png");
    }

    #[tokio::test]
    async fn nested_and_bare_sources_of_one_name() {
        let dir = tempfile::tempdir().unwrap();
        let base = format!("{}/", dir.path().display());
        std::fs::create_dir(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/logo.png"), b"\x89PNG").unwrap();
        std::fs::write(dir.path().join("logo.png"), b"\x89PNG").unwrap();
        let html = r#"<p>x</p><img src="img/logo.png"><img src="logo.png">"#;
        let req = ComposeRequest {
            html_body: Some(html.to_string()),
            text_body: Some("x".to_string()),
            base_path: Some(base),
            ..Default::default()
        };
        let msg = compose_message(&req).await.unwrap();
        let related = &msg.body().parts()[1];
        assert_eq!(related.parts().len(), 3);
        let html_part = String::from_utf8(related.parts()[0].content().unwrap().to_vec()).unwrap();
        assert!(!html_part.contains("cid:cid:"));
        assert!(!html_part.contains("img/cid:"));
        assert_eq!(html_part.matches("src=\"cid:logo.png\"").count(), 2);
    }

    #[tokio::test]
    async fn html_without_inline_images_keeps_sources() {
        let req = ComposeRequest {
            html_body: Some(r#"<p>x</p><img src="http://example.invalid/a.png">"#.to_string()),
            text_body: Some("plain".to_string()),
            inline_images: false,
            ..Default::default()
        };
        let msg = compose_message(&req).await.unwrap();
        let alternative = msg.body();
        assert_eq!(alternative.parts().len(), 2);
        assert_eq!(alternative.parts()[0].content(), Some(&b"plain"[..]));
        assert_eq!(alternative.parts()[1].content_type, "text/html; charset=US-ASCII");
    }

    #[tokio::test]
    async fn missing_attachment_is_io_error() {
        let req = ComposeRequest {
            text_body: Some("x".to_string()),
            attachments: vec!["/nonexistent/file.bin".to_string()],
            ..Default::default()
        };
        assert!(matches!(compose_message(&req).await, Err(MailError::Io(_))));
    }

    #[tokio::test]
    async fn unknown_encoding() {
        let req = ComposeRequest {
            encoding: Some("EBCDIC".to_string()),
            ..Default::default()
        };
        assert!(matches!(compose_message(&req).await, Err(MailError::Charset(_))));
    }
}
