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

//! Editing XML files on disk: load in a declared encoding, splice nodes, save back.

use std::fs;

use ritagli_core::xhtml::{XmlDocument, XmlDocumentError};

const CONFIG: &str = "<?xml version=\"1.0\"?>\n<config>\n  <servlet name=\"home\">\n    <class>Home</class>\n  </servlet>\n  <servlet name=\"mail\">\n    <class>Mail</class>\n  </servlet>\n</config>\n";

#[test]
fn add_and_remove_then_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("web.xml");
    fs::write(&path, CONFIG).unwrap();

    let mut doc = XmlDocument::open(&path).unwrap();
    doc.add_node_and_save(
        "config/servlet[position()=last()]",
        "  <servlet name=\"news\">\n    <class>News</class>\n  </servlet>",
    )
    .unwrap();
    let saved = fs::read_to_string(&path).unwrap();
    assert!(saved.contains("<class>Mail</class>\n  </servlet>  <servlet name=\"news\">"));
    assert!(saved.ends_with("</servlet>\n</config>\n"));

    let mut reopened = XmlDocument::open(&path).unwrap();
    reopened.remove_node_and_save("config/servlet[@name='home']").unwrap();
    let saved = fs::read_to_string(&path).unwrap();
    assert!(!saved.contains("Home"));
    assert!(saved.starts_with("<?xml version=\"1.0\"?>\n<config>\n  <servlet name=\"mail\">"));
}

#[test]
fn shorter_save_truncates_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.xml");
    fs::write(&path, CONFIG).unwrap();
    let mut doc = XmlDocument::open(&path).unwrap();
    doc.remove_node("config/servlet[@name='mail']").unwrap();
    doc.remove_node("config/servlet").unwrap();
    doc.save().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "<?xml version=\"1.0\"?>\n<config>\n</config>\n");
}

#[test]
fn latin1_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latin.xml");
    fs::write(&path, b"<root><name>Espa\xf1a</name></root>").unwrap();

    let mut doc = XmlDocument::open_with_encoding(&path, "ISO-8859-1").unwrap();
    assert!(doc.to_string().contains("España"));
    doc.add_node("root/name", "<city>Córdoba</city>").unwrap();
    doc.save().unwrap();
    assert_eq!(
        fs::read(&path).unwrap(),
        b"<root><name>Espa\xf1a</name><city>C\xf3rdoba</city>\n</root>".to_vec()
    );
}

#[test]
fn unknown_encoding_and_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        XmlDocument::open(dir.path().join("absent.xml")),
        Err(XmlDocumentError::Io(_))
    ));
    let path = dir.path().join("a.xml");
    fs::write(&path, "<a/>").unwrap();
    assert!(matches!(
        XmlDocument::open_with_encoding(&path, "EBCDIC-XYZ"),
        Err(XmlDocumentError::Encoding(_))
    ));
}
