/*
 * replacer.rs
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

//! `{#key}` placeholder substitution in one pass over text, a reader or a file.

use chrono::{Datelike, Local};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use thiserror::Error;

const DEFAULT_BUFFER_SIZE: usize = 32767;

#[derive(Debug, Error)]
pub enum ReplacerError {
    #[error("supplied {keys} keys but {values} values")]
    LengthMismatch { keys: usize, values: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Build a substitution map from parallel key and value lists.
pub fn create_map<K, V>(keys: &[K], values: &[V]) -> Result<HashMap<String, String>, ReplacerError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if keys.len() != values.len() {
        return Err(ReplacerError::LengthMismatch {
            keys: keys.len(),
            values: values.len(),
        });
    }
    Ok(keys
        .iter()
        .zip(values)
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect())
}

/// Today as `Y-M-D` without zero padding.
fn today() -> String {
    let now = Local::now();
    format!("{}-{}-{}", now.year(), now.month(), now.day())
}

/// Substitutes `{#key}` markers from a map.
///
/// `System.Date` and `Sistema.Fecha` are always added to the map with today's date.
/// Unknown keys are written back unchanged. A key runs to the next `}` or the end of input.
#[derive(Debug)]
pub struct StreamReplacer {
    buffer_size: usize,
    replacements: usize,
}

impl Default for StreamReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReplacer {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            replacements: 0,
        }
    }

    /// Number of `{#` markers seen by the last replace call.
    pub fn last_replacements(&self) -> usize {
        self.replacements
    }

    fn add_dates(map: &mut HashMap<String, String>) {
        let today = today();
        map.insert("Sistema.Fecha".to_string(), today.clone());
        map.insert("System.Date".to_string(), today);
    }

    fn run<I>(&mut self, mut input: I, map: &HashMap<String, String>, capacity: usize) -> String
    where
        I: Iterator<Item = char>,
    {
        self.replacements = 0;
        let mut out = String::with_capacity(capacity);
        while let Some(c) = input.next() {
            if c != '{' {
                out.push(c);
                continue;
            }
            match input.next() {
                Some('#') => {
                    self.replacements += 1;
                    let key: String = input.by_ref().take_while(|&ch| ch != '}').collect();
                    match map.get(&key) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push_str("{#");
                            out.push_str(&key);
                            out.push('}');
                        }
                    }
                }
                Some(other) => {
                    out.push('{');
                    out.push(other);
                }
                None => out.push('{'),
            }
        }
        out
    }

    /// Replace markers in `text`.
    pub fn replace_str(&mut self, text: &str, map: &mut HashMap<String, String>) -> String {
        Self::add_dates(map);
        self.run(text.chars(), map, text.len())
    }

    /// Replace markers in a byte stream. Each byte is read as one ISO-8859-1 character.
    pub fn replace_reader<R: Read>(
        &mut self,
        reader: R,
        map: &mut HashMap<String, String>,
    ) -> Result<String, ReplacerError> {
        Self::add_dates(map);
        let mut bytes = Vec::with_capacity(self.buffer_size);
        BufReader::with_capacity(self.buffer_size, reader).read_to_end(&mut bytes)?;
        let capacity = bytes.len();
        Ok(self.run(bytes.into_iter().map(char::from), map, capacity))
    }

    /// Replace markers in the file at `path`.
    pub fn replace_file(
        &mut self,
        path: impl AsRef<Path>,
        map: &mut HashMap<String, String>,
    ) -> Result<String, ReplacerError> {
        let file = File::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "replacing placeholders");
        self.replace_reader(file, map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn substitutes_known_keys() {
        let mut map = create_map(&["name", "Message.id"], &["Ana", "42.1"]).unwrap();
        let mut r = StreamReplacer::new();
        let out = r.replace_str("Hi {#name}, ref {#Message.id} {#missing}", &mut map);
        assert_eq!(out, "Hi Ana, ref 42.1 {#missing}");
        assert_eq!(r.last_replacements(), 3);
    }

    #[test]
    fn brace_without_hash_kept() {
        let mut map = HashMap::new();
        let mut r = StreamReplacer::new();
        assert_eq!(r.replace_str("a {b} {", &mut map), "a {b} {");
        assert_eq!(r.last_replacements(), 0);
    }

    #[test]
    fn unterminated_key_runs_to_end() {
        let mut map = create_map(&["k"], &["v"]).unwrap();
        let mut r = StreamReplacer::new();
        assert_eq!(r.replace_str("x {#k", &mut map), "x v");
    }

    #[test]
    fn date_keys_added() {
        let mut map = HashMap::new();
        let mut r = StreamReplacer::new();
        let out = r.replace_str("{#System.Date}|{#Sistema.Fecha}", &mut map);
        let now = Local::now();
        let expected = format!("{}-{}-{}", now.year(), now.month(), now.day());
        assert_eq!(out, format!("{}|{}", expected, expected));
        assert!(map.contains_key("System.Date"));
    }

    #[test]
    fn reader_is_latin1() {
        let mut map = create_map(&["x"], &["ñ"]).unwrap();
        let mut r = StreamReplacer::with_buffer_size(4);
        let out = r.replace_reader(&b"caf\xe9 {#x}"[..], &mut map).unwrap();
        assert_eq!(out, "café ñ");
    }

    #[test]
    fn file_source() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "<p>{{#greeting}}</p>").unwrap();
        let mut map = create_map(&["greeting"], &["hola"]).unwrap();
        let mut r = StreamReplacer::new();
        assert_eq!(r.replace_file(f.path(), &mut map).unwrap(), "<p>hola</p>");
    }

    #[test]
    fn mismatched_lengths() {
        let err = create_map(&["a", "b"], &["1"]).unwrap_err();
        assert!(matches!(err, ReplacerError::LengthMismatch { keys: 2, values: 1 }));
    }
}
