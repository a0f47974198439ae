/*
 * page.rs
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

//! Inspection of fetched page source: declared charset, title, declared language.

use regex::Regex;
use std::sync::OnceLock;

use crate::xhtml::entities;

const MAX_TITLE_CHARS: usize = 2000;

const META_CHARSET: &str = r#"(?i)content=["']text/\w+;\s*charset=([_\-\w]+)["']"#;
const XML_DECL: &str = r#"(?i)<\?xml version="1\.0" encoding="([_\-\w]+)"\?>"#;
const HTML_LANG: &str = r#"(?i)<html\s+lang=["']?(\w\w)["']?>"#;
const XHTML_LANG: &str = r#"(?i)<html\s+xmlns="http://www.w3.org/1999/xhtml"(?:\s+xml:lang="\w\w-\w\w")?\s+lang="(\w\w)-\w\w">"#;
const META_LANG: &str =
    r#"(?i)<meta\s+http-equiv=["']?Content-Language["']?\s+content=["']?(\w\w)["']?\s?/?>"#;

static META_CHARSET_RE: OnceLock<Option<Regex>> = OnceLock::new();
static XML_DECL_RE: OnceLock<Option<Regex>> = OnceLock::new();
static HTML_LANG_RE: OnceLock<Option<Regex>> = OnceLock::new();
static XHTML_LANG_RE: OnceLock<Option<Regex>> = OnceLock::new();
static META_LANG_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// First capture group of `pattern` in `src`.
fn capture(cell: &'static OnceLock<Option<Regex>>, pattern: &str, src: &str) -> Option<String> {
    cached(cell, pattern)?
        .captures(src)
        .map(|c| c[1].to_string())
}

/// Charset declared in a `<meta content="text/html; charset=...">` or the XML declaration.
pub fn sniff_charset(src: &str) -> Option<String> {
    capture(&META_CHARSET_RE, META_CHARSET, src)
        .or_else(|| capture(&XML_DECL_RE, XML_DECL, src))
}

/// Text of the first `<title>` element, when it does not start the source.
/// Tabs and line breaks are removed, the result is cut to 2000 characters and entities decoded.
pub fn extract_title(src: &str) -> Option<String> {
    let lower = src.to_ascii_lowercase();
    let t = lower.find("<title>").filter(|&t| t > 0)?;
    let u = lower[t + 7..].find("</title>")? + t + 7;
    let raw: String = src[t + 7..u]
        .trim()
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    let title: String = raw.trim().chars().take(MAX_TITLE_CHARS).collect();
    Some(entities::decode(&title))
}

/// Two-letter language declared by the `<html lang>`, XHTML `lang` or Content-Language meta.
pub fn declared_language(src: &str) -> Option<String> {
    capture(&HTML_LANG_RE, HTML_LANG, src)
        .or_else(|| capture(&XHTML_LANG_RE, XHTML_LANG, src))
        .or_else(|| capture(&META_LANG_RE, META_LANG, src))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_from_meta_then_xml_decl() {
        let html = r#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=ISO-8859-1"></head>"#;
        assert_eq!(sniff_charset(html).as_deref(), Some("ISO-8859-1"));
        let xml = r#"<?xml version="1.0" encoding="windows-1252"?><rss/>"#;
        assert_eq!(sniff_charset(xml).as_deref(), Some("windows-1252"));
        assert_eq!(sniff_charset("<html></html>"), None);
    }

    #[test]
    fn title_cleaned_and_decoded() {
        let src = "<html><head><TITLE>\n  Fish &amp; Chips\t</title></head></html>";
        assert_eq!(extract_title(src).as_deref(), Some("Fish & Chips"));
    }

    #[test]
    fn title_at_start_is_ignored() {
        assert_eq!(extract_title("<title>x</title>"), None);
        assert_eq!(extract_title(" <title>unterminated"), None);
    }

    #[test]
    fn language_patterns() {
        assert_eq!(declared_language("<HTML lang=\"es\">").as_deref(), Some("es"));
        assert_eq!(
            declared_language(
                r#"<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="fr-FR" lang="fr-FR">"#
            )
            .as_deref(),
            Some("fr")
        );
        assert_eq!(
            declared_language(r#"<meta http-equiv="Content-Language" content="de" />"#).as_deref(),
            Some("de")
        );
        assert_eq!(declared_language("<html>"), None);
    }
}
