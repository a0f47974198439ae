/*
 * xml_document.rs
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

//! Text-level XML editor: locate an element with a small path language and splice nodes
//! in or out without building a tree. Formatting outside the edited range is preserved.
//!
//! Paths are `/`-separated element names. A step may carry one predicate:
//! - `[@attr='value']` matches when that text occurs inside the element's start tag;
//! - `[position()=last()]` matches the last such element within its parent.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::charset::Charset;

#[derive(Debug, Error)]
pub enum XmlDocumentError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidAccess(String),
    #[error("{0}")]
    NotSupported(String),
    #[error("{0}")]
    Syntax(String),
    #[error("document has no file path")]
    NoPath,
    #[error("unsupported encoding {0}")]
    Encoding(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One parsed path step.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    name: String,
    predicate: String,
}

fn parse_path(xpath: &str) -> Result<Vec<Step>, XmlDocumentError> {
    let mut steps = Vec::new();
    for token in xpath.split('/').filter(|t| !t.is_empty()) {
        match token.find('[') {
            Some(left) if left > 0 => {
                let right = token.find(']').ok_or_else(|| {
                    XmlDocumentError::InvalidAccess("missing right bracket".to_string())
                })?;
                let inner = token.get(left + 1..right).unwrap_or("");
                let predicate = inner.replace('@', " ").replace('\'', "\"").trim().to_string();
                steps.push(Step {
                    name: token[..left].to_string(),
                    predicate,
                });
            }
            _ => steps.push(Step {
                name: token.to_string(),
                predicate: String::new(),
            }),
        }
    }
    Ok(steps)
}

/// True when the byte at `at` ends an element name.
fn ends_name(doc: &str, at: usize) -> bool {
    match doc.as_bytes().get(at) {
        None => true,
        Some(b) => b.is_ascii_whitespace() || *b == b'>' || *b == b'/',
    }
}

/// Find `<name` at or after `from` where the name is not just a prefix of a longer one.
fn find_start_tag(doc: &str, name: &str, mut from: usize) -> Option<usize> {
    let needle = format!("<{}", name);
    loop {
        let at = doc.get(from..)?.find(&needle)? + from;
        if ends_name(doc, at + needle.len()) {
            return Some(at);
        }
        from = at + 1;
    }
}

/// No further `<sibling` start tag before the parent's closing tag.
fn is_last_sibling(doc: &str, from: usize, parent: Option<&str>, sibling: &str) -> bool {
    let Some(next) = find_start_tag(doc, sibling, from) else {
        return true;
    };
    let end_parent = parent.and_then(|p| {
        let needle = format!("</{}", p);
        doc.get(from..)?.find(&needle).map(|i| i + from)
    });
    match end_parent {
        Some(end) => next > end,
        None => true,
    }
}

/// Text-backed XML document.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    text: String,
    path: Option<PathBuf>,
    encoding: String,
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlDocument {
    /// Empty document with UTF-8 encoding.
    pub fn new() -> Self {
        Self {
            text: String::new(),
            path: None,
            encoding: "UTF-8".to_string(),
        }
    }

    /// Document held in memory only; `save()` needs a path set by `save_as` or a load.
    pub fn from_string(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::new()
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, XmlDocumentError> {
        let mut doc = Self::new();
        doc.load(path)?;
        Ok(doc)
    }

    pub fn open_with_encoding(path: impl AsRef<Path>, encoding: &str) -> Result<Self, XmlDocumentError> {
        let mut doc = Self::new();
        doc.load_with_encoding(path, encoding)?;
        Ok(doc)
    }

    pub fn character_encoding(&self) -> &str {
        &self.encoding
    }

    /// Encoding used by later loads and saves.
    pub fn set_character_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = encoding.into();
    }

    fn charset(&self) -> Result<Charset, XmlDocumentError> {
        Charset::from_label(&self.encoding)
            .ok_or_else(|| XmlDocumentError::Encoding(self.encoding.clone()))
    }

    /// Read the file in the current encoding and remember its path.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), XmlDocumentError> {
        let charset = self.charset()?;
        let bytes = fs::read(path.as_ref())?;
        self.text = charset.decode(&bytes);
        self.path = Some(path.as_ref().to_path_buf());
        Ok(())
    }

    pub fn load_with_encoding(&mut self, path: impl AsRef<Path>, encoding: &str) -> Result<(), XmlDocumentError> {
        self.encoding = encoding.to_string();
        self.load(path)
    }

    /// Write to `path` in the current encoding. The loaded path is unchanged.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<(), XmlDocumentError> {
        let charset = self.charset()?;
        fs::write(path.as_ref(), charset.encode(&self.text))?;
        Ok(())
    }

    /// Write back to the path the document was loaded from.
    pub fn save(&self) -> Result<(), XmlDocumentError> {
        let path = self.path.as_ref().ok_or(XmlDocumentError::NoPath)?;
        self.save_as(path)
    }

    /// Byte offset of the `<` that opens the element matched by `xpath`.
    ///
    /// Steps are matched in order, each scan continuing after the previous tag.
    pub fn seek_node(&self, xpath: &str) -> Result<usize, XmlDocumentError> {
        let steps = parse_path(xpath)?;
        let doc = self.text.as_str();
        let mut left = 0;
        let mut node = 0;
        let mut name_seen = false;
        while node < steps.len() {
            let step = &steps[node];
            let Some(start) = find_start_tag(doc, &step.name, left) else {
                if name_seen && !step.predicate.is_empty() {
                    return Err(XmlDocumentError::NotFound(format!(
                        "Attribute {} of node {} not found",
                        step.predicate, step.name
                    )));
                }
                return Err(XmlDocumentError::NotFound(format!("Node {} not found", step.name)));
            };
            let right = doc[start + 1..]
                .find('>')
                .map(|i| i + start + 1)
                .ok_or_else(|| {
                    XmlDocumentError::Syntax(format!("Unclosed Node {} missing >", step.name))
                })?;
            left = start;
            name_seen = true;
            let matched = if step.predicate.is_empty() {
                true
            } else if step.predicate.starts_with("position()") {
                let value = step.predicate.split('=').nth(1).map(str::trim);
                if value != Some("last()") {
                    return Err(XmlDocumentError::NotSupported(
                        "position() function can only be declared equal to last() function"
                            .to_string(),
                    ));
                }
                let parent = node.checked_sub(1).map(|p| steps[p].name.as_str());
                is_last_sibling(doc, right, parent, &step.name)
            } else {
                doc[start + 1..right].contains(step.predicate.as_str())
            };
            if matched {
                node += 1;
                name_seen = false;
            }
            if node < steps.len() {
                left = right;
            }
        }
        Ok(left)
    }

    /// Name of the element whose start tag begins at `open`, if there is one.
    fn element_name(&self, open: usize) -> Option<&str> {
        let rest = self.text.get(open..)?.strip_prefix('<')?;
        let end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        Some(&rest[..end]).filter(|name| !name.is_empty())
    }

    /// Insert `node` and a newline right after the end tag of the element matched by `after_xpath`.
    /// Line breaks that followed the end tag are dropped.
    pub fn add_node(&mut self, after_xpath: &str, node: &str) -> Result<(), XmlDocumentError> {
        let open = self.seek_node(after_xpath)?;
        let name = self.element_name(open).ok_or_else(|| {
            XmlDocumentError::NotFound(format!("No element at path '{}'", after_xpath))
        })?;
        let close_tag = format!("</{}>", name);
        let close = self.text[open..]
            .find(&close_tag)
            .map(|i| i + open)
            .ok_or_else(|| XmlDocumentError::NotFound(format!("Node {} not found", close_tag)))?;
        let insert_at = close + close_tag.len();
        let tail = self.text[insert_at..]
            .find(|c: char| c != '\r' && c != '\n')
            .map_or(self.text.len(), |i| i + insert_at);
        let mut edited = String::with_capacity(self.text.len() + node.len() + 1);
        edited.push_str(&self.text[..insert_at]);
        edited.push_str(node);
        edited.push('\n');
        edited.push_str(&self.text[tail..]);
        self.text = edited;
        Ok(())
    }

    pub fn add_node_and_save(&mut self, after_xpath: &str, node: &str) -> Result<(), XmlDocumentError> {
        self.add_node(after_xpath, node)?;
        self.save()
    }

    /// Cut the element matched by `xpath`, together with the spaces before its start tag and
    /// the line breaks after its end tag.
    pub fn remove_node(&mut self, xpath: &str) -> Result<(), XmlDocumentError> {
        let mut start = self.seek_node(xpath)?;
        let steps = parse_path(xpath)?;
        let name = steps
            .last()
            .map(|s| s.name.as_str())
            .ok_or_else(|| XmlDocumentError::NotFound(format!("No element at path '{}'", xpath)))?;
        let close_tag = format!("</{}>", name);
        let mut end = self.text[start..]
            .find(&close_tag)
            .map(|i| i + start + close_tag.len())
            .ok_or_else(|| XmlDocumentError::NotFound(format!("Node {} not found", close_tag)))?;
        let bytes = self.text.as_bytes();
        while start > 0 && bytes[start - 1] == b' ' {
            start -= 1;
        }
        while end < bytes.len() && (bytes[end] == b'\r' || bytes[end] == b'\n') {
            end += 1;
        }
        self.text.replace_range(start..end, "");
        Ok(())
    }

    pub fn remove_node_and_save(&mut self, xpath: &str) -> Result<(), XmlDocumentError> {
        self.remove_node(xpath)?;
        self.save()
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "<catalog>\n  <item id=\"1\">\n    <name>One</name>\n  </item>\n  <item id=\"2\">\n    <name>Two</name>\n  </item>\n</catalog>\n";

    #[test]
    fn seeks_by_attribute() {
        let doc = XmlDocument::from_string(DOC);
        let at = doc.seek_node("catalog/item[@id='2']").unwrap();
        assert!(DOC[at..].starts_with("<item id=\"2\">"));
    }

    #[test]
    fn seeks_last_position() {
        let doc = XmlDocument::from_string(DOC);
        let at = doc.seek_node("catalog/item[position()=last()]").unwrap();
        assert!(DOC[at..].starts_with("<item id=\"2\">"));
        let first = doc.seek_node("/catalog/item").unwrap();
        assert!(DOC[first..].starts_with("<item id=\"1\">"));
    }

    #[test]
    fn name_prefix_does_not_match() {
        let doc = XmlDocument::from_string("<items><itemx/><item a=\"b\">x</item></items>");
        let at = doc.seek_node("items/item").unwrap();
        assert_eq!(at, 15);
    }

    #[test]
    fn error_kinds() {
        let doc = XmlDocument::from_string(DOC);
        assert!(matches!(doc.seek_node("catalog/nothing"), Err(XmlDocumentError::NotFound(_))));
        assert!(matches!(
            doc.seek_node("catalog/item[@id='9']"),
            Err(XmlDocumentError::NotFound(ref m)) if m.starts_with("Attribute")
        ));
        assert!(matches!(doc.seek_node("catalog/item[@id='1'"), Err(XmlDocumentError::InvalidAccess(_))));
        assert!(matches!(
            doc.seek_node("catalog/item[position()=1]"),
            Err(XmlDocumentError::NotSupported(_))
        ));
        let broken = XmlDocument::from_string("<a><b");
        assert!(matches!(broken.seek_node("a/b"), Err(XmlDocumentError::Syntax(_))));
    }

    #[test]
    fn adds_after_closing_tag() {
        let mut doc = XmlDocument::from_string(DOC);
        doc.add_node("catalog/item[@id='1']", "  <item id=\"3\"/>").unwrap();
        assert_eq!(
            doc.to_string(),
            "<catalog>\n  <item id=\"1\">\n    <name>One</name>\n  </item>  <item id=\"3\"/>\n  <item id=\"2\">\n    <name>Two</name>\n  </item>\n</catalog>\n"
        );
    }

    #[test]
    fn removes_with_surrounding_whitespace() {
        let mut doc = XmlDocument::from_string(DOC);
        doc.remove_node("catalog/item[@id='1']").unwrap();
        assert_eq!(
            doc.to_string(),
            "<catalog>\n  <item id=\"2\">\n    <name>Two</name>\n  </item>\n</catalog>\n"
        );
    }

    #[test]
    fn save_without_path() {
        let doc = XmlDocument::from_string("<a/>");
        assert!(matches!(doc.save(), Err(XmlDocumentError::NoPath)));
    }

    #[test]
    fn add_without_element_is_an_error() {
        let mut empty = XmlDocument::from_string("");
        assert!(matches!(empty.add_node("", "<x/>"), Err(XmlDocumentError::NotFound(_))));
        assert_eq!(empty.to_string(), "");
        let mut text_only = XmlDocument::from_string("plain text");
        assert!(matches!(text_only.add_node("/", "<x/>"), Err(XmlDocumentError::NotFound(_))));
        let mut empty = XmlDocument::from_string("");
        assert!(matches!(empty.remove_node(""), Err(XmlDocumentError::NotFound(_))));
    }

    #[test]
    fn encoding_setter_applies() {
        let mut doc = XmlDocument::new();
        assert_eq!(doc.character_encoding(), "UTF-8");
        doc.set_character_encoding("ISO-8859-1");
        assert_eq!(doc.character_encoding(), "ISO-8859-1");
    }
}
