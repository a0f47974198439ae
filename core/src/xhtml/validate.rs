/*
 * validate.rs
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

//! Streaming well-formedness check over quick-xml events, and the validator behind
//! the `saxvalidate` command.

use std::fmt;
use std::fs;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::xhtml::stylesheet_cache::{XsltProcessor, XsltprocCommand};

/// One problem found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Byte offset where the problem was detected.
    pub position: u64,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (byte {})", self.message, self.position)
    }
}

fn attribute_issues(start: &BytesStart<'_>) -> Vec<String> {
    let mut found = Vec::new();
    for attr in start.attributes() {
        match attr {
            Ok(a) => {
                if let Err(err) = a.unescape_value() {
                    found.push(err.to_string());
                }
            }
            Err(err) => found.push(err.to_string()),
        }
    }
    found
}

/// Check that the document is well formed: balanced tags, one root element, text and
/// attribute values with valid references, and syntactically valid attributes.
///
/// Scanning stops at the first syntax error; other problems are collected.
pub fn validate_well_formed<R: Read>(reader: R) -> Result<(), Vec<ValidationIssue>> {
    let mut xml = Reader::from_reader(BufReader::new(reader));
    let mut buf = Vec::new();
    let mut issues = Vec::new();
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut roots = 0usize;

    loop {
        let event = xml.read_event_into(&mut buf);
        let position = xml.buffer_position() as u64;
        let mut issue = |message: String| issues.push(ValidationIssue { position, message });
        match event {
            Err(e) => {
                issue(e.to_string());
                break;
            }
            Ok(Event::Eof) => {
                if let Some(name) = open.last() {
                    issue(format!(
                        "element {} is not closed",
                        String::from_utf8_lossy(name)
                    ));
                }
                if roots == 0 {
                    issue("document has no root element".to_string());
                }
                break;
            }
            Ok(Event::Start(e)) => {
                if open.is_empty() {
                    roots += 1;
                    if roots > 1 {
                        issue("content after the root element".to_string());
                    }
                }
                attribute_issues(&e).into_iter().for_each(&mut issue);
                open.push(e.name().as_ref().to_vec());
            }
            Ok(Event::Empty(e)) => {
                if open.is_empty() {
                    roots += 1;
                    if roots > 1 {
                        issue("content after the root element".to_string());
                    }
                }
                attribute_issues(&e).into_iter().for_each(&mut issue);
            }
            Ok(Event::End(_)) => {
                open.pop();
            }
            Ok(Event::Text(t)) => {
                if open.is_empty() {
                    if !t.iter().all(|b| b.is_ascii_whitespace()) {
                        issue("text outside the root element".to_string());
                    }
                } else if let Err(err) = t.unescape() {
                    issue(err.to_string());
                }
            }
            Ok(Event::CData(_)) if open.is_empty() => {
                issue("CDATA outside the root element".to_string());
            }
            Ok(_) => {}
        }
        buf.clear();
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Well-formedness check with optional XML Schema validation, reporting each problem as
/// an `ERROR:` line.
pub struct SaxValidator {
    schema: bool,
    schema_path: Option<PathBuf>,
    processor: Arc<dyn XsltProcessor>,
}

impl SaxValidator {
    pub fn new(schema: bool) -> Self {
        Self {
            schema,
            schema_path: None,
            processor: Arc::new(XsltprocCommand),
        }
    }

    /// XSD used when schema validation is on.
    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn XsltProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Validate the document from `reader`, writing `ERROR: <message>` lines to `out`.
    /// Returns whether the document is valid.
    pub fn run<R: Read, W: Write>(&self, mut reader: R, out: &mut W) -> io::Result<bool> {
        let mut document = Vec::new();
        reader.read_to_end(&mut document)?;
        let mut valid = true;
        if let Err(issues) = validate_well_formed(document.as_slice()) {
            valid = false;
            for issue in issues {
                writeln!(out, "ERROR: {}", issue)?;
            }
        }
        if valid && self.schema {
            if let Some(path) = &self.schema_path {
                let xsd = fs::read(path)?;
                if let Err(message) = self.processor.validate(&xsd, &document) {
                    valid = false;
                    writeln!(out, "ERROR: {}", message)?;
                }
            }
        }
        tracing::debug!(valid, "document checked");
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xhtml::stylesheet_cache::{StylesheetError, Template};

    fn issues(xml: &str) -> Vec<String> {
        match validate_well_formed(xml.as_bytes()) {
            Ok(()) => Vec::new(),
            Err(v) => v.into_iter().map(|i| i.message).collect(),
        }
    }

    #[test]
    fn well_formed_document() {
        assert!(validate_well_formed(
            &b"<?xml version=\"1.0\"?>\n<a x=\"1\"><b>t &amp; u</b><c/></a>\n"[..]
        )
        .is_ok());
    }

    #[test]
    fn mismatched_and_unclosed() {
        assert_eq!(issues("<a><b></a>").len(), 1);
        assert_eq!(issues("<a><b></b>"), vec!["element a is not closed".to_string()]);
    }

    #[test]
    fn single_root_and_stray_text() {
        assert_eq!(issues("<a/><b/>"), vec!["content after the root element".to_string()]);
        assert_eq!(issues("<a/>tail"), vec!["text outside the root element".to_string()]);
        assert_eq!(issues(""), vec!["document has no root element".to_string()]);
    }

    #[test]
    fn bad_references_and_attributes() {
        assert_eq!(issues("<a>x &nope; y</a>").len(), 1);
        assert_eq!(issues("<a x=\"1\" x=\"2\"/>").len(), 1);
    }

    struct RejectAll;

    impl XsltProcessor for RejectAll {
        fn compile(&self, stylesheet: Vec<u8>, system_id: Option<String>) -> Result<Template, StylesheetError> {
            Ok(Template { source: stylesheet, system_id })
        }

        fn transform(
            &self,
            _: &Template,
            _: &[(String, String)],
            xml: &[u8],
            _: Option<&str>,
        ) -> Result<Vec<u8>, StylesheetError> {
            Ok(xml.to_vec())
        }

        fn validate(&self, _: &[u8], _: &[u8]) -> Result<(), String> {
            Err("element a: not expected".to_string())
        }
    }

    #[test]
    fn validator_prints_errors() {
        let mut out = Vec::new();
        let ok = SaxValidator::new(false).run(&b"<a><b></a>"[..], &mut out).unwrap();
        assert!(!ok);
        assert!(String::from_utf8(out).unwrap().starts_with("ERROR: "));

        let dir = tempfile::tempdir().unwrap();
        let xsd = dir.path().join("s.xsd");
        fs::write(&xsd, "<xs:schema/>").unwrap();
        let validator = SaxValidator::new(true)
            .with_schema_path(&xsd)
            .with_processor(Arc::new(RejectAll));
        let mut out = Vec::new();
        assert!(!validator.run(&b"<a/>"[..], &mut out).unwrap());
        assert_eq!(String::from_utf8(out).unwrap(), "ERROR: element a: not expected\n");

        let mut out = Vec::new();
        assert!(SaxValidator::new(true).run(&b"<a/>"[..], &mut out).unwrap());
        assert!(out.is_empty());
    }
}
