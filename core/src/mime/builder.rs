/*
 * builder.rs
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

//! MIME entity tree and its serialization: leaf parts with a transfer encoding,
//! multipart containers with generated boundaries.

use crate::charset::Charset;
use crate::mime::{base64, quoted_printable};

/// SMTP line limit excluding CRLF (RFC 5321 section 4.5.3.1.6).
const MAX_7BIT_LINE: usize = 998;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    SevenBit,
    QuotedPrintable,
    Base64,
}

impl TransferEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispositionKind {
    Inline,
    Attachment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    pub kind: DispositionKind,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    Leaf {
        content: Vec<u8>,
        encoding: TransferEncoding,
    },
    Multipart {
        subtype: String,
        parts: Vec<MimePart>,
    },
}

/// One MIME entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePart {
    /// Content-Type without the boundary parameter (added on write for multiparts).
    pub content_type: String,
    pub disposition: Option<Disposition>,
    pub content_id: Option<String>,
    pub body: PartBody,
}

impl MimePart {
    /// `text/<subtype>` in `charset`. 7bit when the encoded text is ASCII with short lines,
    /// otherwise quoted-printable.
    pub fn text(subtype: &str, text: &str, charset: Charset) -> Self {
        let content = charset.encode(text);
        let seven_bit = content.is_ascii()
            && content
                .split(|b| *b == b'\n')
                .all(|line| line.len() <= MAX_7BIT_LINE);
        Self {
            content_type: format!("text/{}; charset={}", subtype, charset.name()),
            disposition: None,
            content_id: None,
            body: PartBody::Leaf {
                content,
                encoding: if seven_bit {
                    TransferEncoding::SevenBit
                } else {
                    TransferEncoding::QuotedPrintable
                },
            },
        }
    }

    /// Binary content, base64 encoded.
    pub fn binary(mime_type: &str, content: Vec<u8>) -> Self {
        Self {
            content_type: mime_type.to_string(),
            disposition: None,
            content_id: None,
            body: PartBody::Leaf {
                content,
                encoding: TransferEncoding::Base64,
            },
        }
    }

    pub fn multipart(subtype: &str, parts: Vec<MimePart>) -> Self {
        Self {
            content_type: format!("multipart/{}", subtype),
            disposition: None,
            content_id: None,
            body: PartBody::Multipart {
                subtype: subtype.to_string(),
                parts,
            },
        }
    }

    pub fn with_disposition(mut self, kind: DispositionKind, filename: Option<&str>) -> Self {
        self.disposition = Some(Disposition {
            kind,
            filename: filename.map(|s| s.to_string()),
        });
        self
    }

    pub fn with_content_id(mut self, id: &str) -> Self {
        self.content_id = Some(id.to_string());
        self
    }

    pub fn parts(&self) -> &[MimePart] {
        match &self.body {
            PartBody::Multipart { parts, .. } => parts,
            PartBody::Leaf { .. } => &[],
        }
    }

    /// Decoded leaf content, None for multiparts.
    pub fn content(&self) -> Option<&[u8]> {
        match &self.body {
            PartBody::Leaf { content, .. } => Some(content),
            PartBody::Multipart { .. } => None,
        }
    }

    /// Write the entity headers and body. No trailing CRLF after the body.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match &self.body {
            PartBody::Leaf { content, encoding } => {
                append_header(out, "Content-Type", &self.content_type);
                append_header(out, "Content-Transfer-Encoding", encoding.as_str());
                self.append_identity(out);
                out.extend_from_slice(b"\r\n");
                match encoding {
                    TransferEncoding::SevenBit => append_crlf_text(out, content),
                    TransferEncoding::QuotedPrintable => {
                        out.extend_from_slice(quoted_printable::encode(content).as_bytes())
                    }
                    TransferEncoding::Base64 => {
                        out.extend_from_slice(base64::encode_lines(content).as_bytes())
                    }
                }
            }
            PartBody::Multipart { parts, .. } => {
                let boundary = new_boundary();
                append_header(
                    out,
                    "Content-Type",
                    &format!("{}; boundary=\"{}\"", self.content_type, boundary),
                );
                self.append_identity(out);
                out.extend_from_slice(b"\r\nThis is a multi-part message in MIME format.\r\n");
                for part in parts {
                    out.extend_from_slice(b"\r\n--");
                    out.extend_from_slice(boundary.as_bytes());
                    out.extend_from_slice(b"\r\n");
                    part.write_to(out);
                }
                out.extend_from_slice(b"\r\n--");
                out.extend_from_slice(boundary.as_bytes());
                out.extend_from_slice(b"--\r\n");
            }
        }
    }

    fn append_identity(&self, out: &mut Vec<u8>) {
        if let Some(d) = &self.disposition {
            let kind = match d.kind {
                DispositionKind::Inline => "inline",
                DispositionKind::Attachment => "attachment",
            };
            let value = match &d.filename {
                Some(name) => format!("{}; filename=\"{}\"", kind, quote_param(name)),
                None => kind.to_string(),
            };
            append_header(out, "Content-Disposition", &value);
        }
        if let Some(id) = &self.content_id {
            append_header(out, "Content-ID", &format!("<{}>", id));
        }
    }
}

pub fn append_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn quote_param(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Normalise bare LF to CRLF.
fn append_crlf_text(out: &mut Vec<u8>, content: &[u8]) {
    let mut prev = 0u8;
    for &b in content {
        if b == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        prev = b;
    }
}

/// Random multipart boundary.
pub fn new_boundary() -> String {
    let mut bytes = [0u8; 12];
    if getrandom::getrandom(&mut bytes).is_err() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        bytes[..8].copy_from_slice(&(nanos as u64).to_le_bytes());
        bytes[8..].copy_from_slice(&std::process::id().to_le_bytes());
    }
    let mut s = String::from("----=_Part_");
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(part: &MimePart) -> String {
        let mut out = Vec::new();
        part.write_to(&mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn ascii_text_is_7bit() {
        let part = MimePart::text("plain", "hello\nworld", Charset::UsAscii);
        let s = render(&part);
        assert!(s.starts_with("Content-Type: text/plain; charset=US-ASCII\r\n"));
        assert!(s.contains("Content-Transfer-Encoding: 7bit\r\n"));
        assert!(s.ends_with("\r\nhello\r\nworld"));
    }

    #[test]
    fn latin1_text_is_quoted_printable() {
        let part = MimePart::text("plain", "caf\u{e9}", Charset::Latin1);
        let s = render(&part);
        assert!(s.contains("quoted-printable"));
        assert!(s.ends_with("caf=E9"));
    }

    #[test]
    fn multipart_uses_one_boundary() {
        let part = MimePart::multipart(
            "alternative",
            vec![
                MimePart::text("plain", "a", Charset::UsAscii),
                MimePart::text("html", "<b>a</b>", Charset::UsAscii),
            ],
        );
        let s = render(&part);
        let start = s.find("boundary=\"").unwrap() + 10;
        let end = s[start..].find('"').unwrap() + start;
        let boundary = &s[start..end];
        assert_eq!(s.matches(&format!("--{}\r\n", boundary)).count(), 2);
        assert!(s.ends_with(&format!("--{}--\r\n", boundary)));
    }

    #[test]
    fn attachment_headers() {
        let part = MimePart::binary("application/octet-stream", b"PDF".to_vec())
            .with_disposition(DispositionKind::Attachment, Some("r\"1\".pdf"))
            .with_content_id("logo.png");
        let s = render(&part);
        assert!(s.contains("Content-Disposition: attachment; filename=\"r\\\"1\\\".pdf\"\r\n"));
        assert!(s.contains("Content-ID: <logo.png>\r\n"));
        assert!(s.contains("UERG\r\n"));
    }

    #[test]
    fn boundaries_differ() {
        assert_ne!(new_boundary(), new_boundary());
    }
}
