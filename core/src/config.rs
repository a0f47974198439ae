/*
 * config.rs
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

//! Properties: string key/value configuration read from the XML properties format
//! (`<properties><entry key="k">v</entry></properties>`) or the `key=value` text format.
//! XML read/write uses the quick_xml reader and writer; the text format follows the
//! classic properties grammar (comments, continuations, `\uXXXX` escapes).

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

const PROPERTIES_DOCTYPE: &str = r#"properties SYSTEM "http://java.sun.com/dtd/properties.dtd""#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("malformed properties: {0}")]
    Malformed(String),
}

/// Ordered string map of configuration keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Value for `key` when present and not blank.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Load a file, choosing the XML reader when the content starts with `<`.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        if content.trim_start().starts_with('<') {
            Self::from_xml(&content)
        } else {
            Ok(Self::from_text(&content))
        }
    }

    /// Parse the XML properties format. `<comment>` is ignored.
    pub fn from_xml(content: &str) -> Result<Self, ConfigError> {
        let mut reader = Reader::from_str(content);
        let mut buf = Vec::new();
        let mut out = Properties::new();
        let mut current_key: Option<String> = None;
        let mut current_value = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Err(e) => return Err(ConfigError::Xml(e.to_string())),
                Ok(Event::Eof) => break,
                Ok(Event::Start(e)) if e.name().as_ref() == b"entry" => {
                    current_key = Some(entry_key(&e)?);
                    current_value.clear();
                }
                Ok(Event::Empty(e)) if e.name().as_ref() == b"entry" => {
                    out.set(entry_key(&e)?, "");
                }
                Ok(Event::Text(e)) => {
                    if current_key.is_some() {
                        let text = e.unescape().map_err(|e| ConfigError::Xml(e.to_string()))?;
                        current_value.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if current_key.is_some() {
                        current_value.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::End(e)) if e.name().as_ref() == b"entry" => {
                    if let Some(key) = current_key.take() {
                        out.set(key, std::mem::take(&mut current_value));
                    }
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(out)
    }

    /// Parse the text format: `key=value`, `key: value` or `key value` per logical line.
    pub fn from_text(content: &str) -> Self {
        let mut out = Properties::new();
        let mut lines = content.lines();
        while let Some(first) = lines.next() {
            let trimmed = first.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }
            let mut logical = String::from(trimmed);
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some(next) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }
            let (key, value) = split_key_value(&logical);
            out.set(unescape(key), unescape(value));
        }
        out
    }

    /// Serialize to the XML properties format.
    pub fn to_xml_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        let mut out = Vec::new();
        let mut writer = Writer::new_with_indent(&mut out, b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))
            .map_err(xml_err)?;
        writer
            .write_event(Event::DocType(BytesText::from_escaped(PROPERTIES_DOCTYPE)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("properties")))
            .map_err(xml_err)?;
        for (k, v) in &self.entries {
            let start = BytesStart::new("entry").with_attributes([("key", k.as_str())]);
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(v.as_str())))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new("entry")))
                .map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("properties")))
            .map_err(xml_err)?;
        Ok(out)
    }

    /// Write the XML form. On Unix the file is created with mode 0o600 since it may hold passwords.
    pub fn save_xml(&self, path: &Path) -> Result<(), ConfigError> {
        let bytes = self.to_xml_bytes()?;
        let mut f = open_for_write(path)?;
        f.write_all(&bytes)?;
        f.flush()?;
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut p = Properties::new();
        for (k, v) in iter {
            p.set(k, v);
        }
        p
    }
}

fn xml_err<E: std::fmt::Display>(e: E) -> ConfigError {
    ConfigError::Xml(e.to_string())
}

fn entry_key(e: &BytesStart<'_>) -> Result<String, ConfigError> {
    let attr = e
        .try_get_attribute("key")
        .map_err(|e| ConfigError::Xml(e.to_string()))?
        .ok_or_else(|| ConfigError::Malformed("entry without key attribute".into()))?;
    let value = attr
        .unescape_value()
        .map_err(|e| ConfigError::Xml(e.to_string()))?;
    Ok(value.into_owned())
}

/// Odd number of trailing backslashes means the line continues.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'=' | b':' | b' ' | b'\t' | b'\x0c' => break,
            _ => i += 1,
        }
    }
    let i = i.min(bytes.len());
    let key = &line[..i];
    let mut rest = line[i..].trim_start_matches([' ', '\t', '\x0c']);
    if rest.starts_with('=') || rest.starts_with(':') {
        rest = rest[1..].trim_start_matches([' ', '\t', '\x0c']);
    }
    (key, rest)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn open_for_write(path: &Path) -> Result<File, std::io::Error> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .mode(0o600)
            .open(path)
    }
    #[cfg(not(unix))]
    {
        File::create(path)
    }
}
