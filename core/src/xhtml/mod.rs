/*
 * mod.rs
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

//! Markup utilities: HTML entities and text, placeholder replacement, the text-level XML
//! editor, stylesheet caches and well-formedness validation.

pub mod entities;
pub mod html_text;
pub mod less_cache;
pub mod replacer;
pub mod stylesheet_cache;
pub mod validate;
pub mod xml_document;

pub use less_cache::{LessCache, LessCompiler, LessError, LesscCommand};
pub use replacer::{create_map, ReplacerError, StreamReplacer};
pub use stylesheet_cache::{
    StylesheetCache, StylesheetError, Template, Transformer, XsltProcessor, XsltprocCommand,
};
pub use validate::{validate_well_formed, SaxValidator, ValidationIssue};
pub use xml_document::{XmlDocument, XmlDocumentError};
