/*
 * html_text.rs
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

//! Visible text and image references of an HTML document.

use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose content is never shown.
const HIDDEN: &[&str] = &["script", "style", "head", "noscript", "template"];

/// Elements that start a new line.
const BLOCKS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "table", "tr", "h1", "h2", "h3", "h4", "h5", "h6",
    "blockquote", "pre", "section", "article", "header", "footer", "hr", "dl", "dt", "dd",
    "form", "title",
];

fn walk(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if HIDDEN.contains(&name) {
        return;
    }
    let block = BLOCKS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    walk(child, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push('\n');
    }
}

/// Collapse whitespace runs to one space per line and drop empty lines.
fn collapse(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Visible text of `html`, one line per block element. Comments, scripts and styles are dropped
/// and character references are decoded.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::with_capacity(html.len() / 2);
    walk(document.root_element(), &mut raw);
    collapse(&raw)
}

/// `src` attribute of every `<img>`, in document order.
pub fn image_sources(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(img) = Selector::parse("img[src]") else {
        return Vec::new();
    };
    document
        .select(&img)
        .filter_map(|el| el.value().attr("src"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_markup() {
        let html = "<html><head><title>T</title><style>p{}</style></head>\
<body><h1>Hello &amp; welcome</h1><!-- note --><p>First   para<br>next</p>\
<script>var x = 1;</script><div>Last</div></body></html>";
        assert_eq!(extract_text(html), "Hello & welcome\nFirst para\nnext\nLast");
    }

    #[test]
    fn fragments_are_accepted() {
        assert_eq!(extract_text("plain <b>bold</b> text"), "plain bold text");
    }

    #[test]
    fn images_in_order() {
        let html = r#"<p><img src="a/logo.png"><img alt="none"><IMG SRC='b.gif'></p>"#;
        assert_eq!(image_sources(html), vec!["a/logo.png", "b.gif"]);
    }
}
