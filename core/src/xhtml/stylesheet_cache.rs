/*
 * stylesheet_cache.rs
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

//! XSLT stylesheet cache keyed by file path and modification time.
//!
//! Compilation and transformation are delegated to an [`XsltProcessor`]. The default
//! processor runs `xsltproc` for transforms and `xmllint --schema` for validation.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::SystemTime;
use thiserror::Error;

use crate::charset::{decode_with_label, Charset};
use crate::config::Properties;
use crate::xhtml::validate::validate_well_formed;

/// Encoding assumed for XML input without an `encoding` attribute.
pub const DEFAULT_XML_ENCODING: &str = "ISO-8859-1";

#[derive(Debug, Error)]
pub enum StylesheetError {
    #[error("stylesheet not found: {0}")]
    NotFound(PathBuf),
    #[error("stylesheet compile error: {0}")]
    Compile(String),
    #[error("transform failed: {0}")]
    Transform(String),
    #[error("unsupported encoding {0}")]
    Encoding(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A stylesheet accepted by the processor, ready to be applied any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub source: Vec<u8>,
    /// Base for relative imports; the file path for cached sheets.
    pub system_id: Option<String>,
}

/// XSLT and XML Schema backend.
pub trait XsltProcessor: Send + Sync {
    fn compile(&self, stylesheet: Vec<u8>, system_id: Option<String>) -> Result<Template, StylesheetError>;

    fn transform(
        &self,
        template: &Template,
        params: &[(String, String)],
        xml: &[u8],
        xml_system_id: Option<&str>,
    ) -> Result<Vec<u8>, StylesheetError>;

    /// Ok when `xml` is valid against the schema `xsd`, otherwise the validator's message.
    fn validate(&self, xsd: &[u8], xml: &[u8]) -> Result<(), String>;
}

/// `xsltproc` / `xmllint` from libxml2, found on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct XsltprocCommand;

fn scratch_file(contents: &[u8], suffix: &str) -> io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile()?;
    file.write_all(contents)?;
    file.flush()?;
    Ok(file)
}

fn command_failure(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = stderr.trim();
    if message.is_empty() {
        format!("exit status {}", output.status)
    } else {
        message.to_string()
    }
}

impl XsltProcessor for XsltprocCommand {
    fn compile(&self, stylesheet: Vec<u8>, system_id: Option<String>) -> Result<Template, StylesheetError> {
        if let Err(issues) = validate_well_formed(stylesheet.as_slice()) {
            let first = issues.first().map(|i| i.to_string()).unwrap_or_default();
            return Err(StylesheetError::Compile(first));
        }
        Ok(Template { source: stylesheet, system_id })
    }

    fn transform(
        &self,
        template: &Template,
        params: &[(String, String)],
        xml: &[u8],
        xml_system_id: Option<&str>,
    ) -> Result<Vec<u8>, StylesheetError> {
        // A file-backed sheet is run in place so relative imports resolve.
        let scratch_xsl;
        let xsl_path = match template.system_id.as_deref().map(Path::new) {
            Some(p) if p.is_file() => p.to_path_buf(),
            _ => {
                scratch_xsl = scratch_file(&template.source, ".xsl")?;
                scratch_xsl.path().to_path_buf()
            }
        };
        let input = scratch_file(xml, ".xml")?;
        let mut cmd = Command::new("xsltproc");
        for (name, value) in params {
            cmd.arg("--stringparam").arg(name).arg(value);
        }
        if let Some(dir) = xml_system_id.and_then(|id| Path::new(id).parent()) {
            if !dir.as_os_str().is_empty() {
                cmd.arg("--path").arg(dir);
            }
        }
        let output = cmd.arg(&xsl_path).arg(input.path()).output()?;
        if !output.status.success() {
            return Err(StylesheetError::Transform(command_failure(&output)));
        }
        Ok(output.stdout)
    }

    fn validate(&self, xsd: &[u8], xml: &[u8]) -> Result<(), String> {
        let schema = scratch_file(xsd, ".xsd").map_err(|e| e.to_string())?;
        let input = scratch_file(xml, ".xml").map_err(|e| e.to_string())?;
        let output = Command::new("xmllint")
            .arg("--noout")
            .arg("--schema")
            .arg(schema.path())
            .arg(input.path())
            .output()
            .map_err(|e| e.to_string())?;
        if output.status.success() {
            Ok(())
        } else {
            Err(command_failure(&output))
        }
    }
}

/// A template plus the parameters for one run.
#[derive(Clone)]
pub struct Transformer {
    template: Arc<Template>,
    params: Vec<(String, String)>,
    processor: Arc<dyn XsltProcessor>,
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("system_id", &self.template.system_id)
            .field("params", &self.params)
            .finish()
    }
}

impl Transformer {
    /// Set or replace a stylesheet parameter.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn transform(&self, xml: &[u8], xml_system_id: Option<&str>) -> Result<Vec<u8>, StylesheetError> {
        self.processor
            .transform(&self.template, &self.params, xml, xml_system_id)
    }
}

/// Pass every property to the stylesheet as `param_<key>`.
pub fn set_parameters(transformer: &mut Transformer, props: &Properties) {
    for (key, value) in props.iter() {
        transformer.set_parameter(format!("param_{}", key), value);
    }
}

/// Encoding named after the first `encoding` in `xml`, read the way a prolog scanner does:
/// skip spaces and `=`, then take a double-quoted value or run to a space or `?`.
pub fn sniff_encoding(xml: &str) -> String {
    let Some(at) = xml.to_ascii_lowercase().find("encoding") else {
        return DEFAULT_XML_ENCODING.to_string();
    };
    let rest = xml[at + "encoding".len()..].trim_start_matches([' ', '=']);
    let rest = rest.trim_start_matches(' ');
    let value = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or(""),
        None => rest.split([' ', '?']).next().unwrap_or(""),
    };
    value.to_string()
}

fn charset_for(label: &str) -> Result<Charset, StylesheetError> {
    Charset::from_label(label).ok_or_else(|| StylesheetError::Encoding(label.to_string()))
}

#[derive(Debug)]
struct SheetEntry {
    modified: SystemTime,
    template: Arc<Template>,
}

/// Compiled stylesheets keyed by path. An entry is recompiled when its file is newer.
pub struct StylesheetCache {
    processor: Arc<dyn XsltProcessor>,
    entries: Mutex<HashMap<PathBuf, SheetEntry>>,
}

impl Default for StylesheetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StylesheetCache {
    pub fn new() -> Self {
        Self::with_processor(Arc::new(XsltprocCommand))
    }

    pub fn with_processor(processor: Arc<dyn XsltProcessor>) -> Self {
        Self {
            processor,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide cache using the default processor.
    pub fn global() -> &'static StylesheetCache {
        static GLOBAL: OnceLock<StylesheetCache> = OnceLock::new();
        GLOBAL.get_or_init(StylesheetCache::new)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, SheetEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transformer_for(&self, template: Arc<Template>) -> Transformer {
        Transformer {
            template,
            params: Vec::new(),
            processor: Arc::clone(&self.processor),
        }
    }

    pub fn is_cached(&self, path: impl AsRef<Path>) -> bool {
        self.entries().contains_key(path.as_ref())
    }

    /// Transformer for the stylesheet at `path`, compiling it unless a cached copy is current.
    pub fn new_transformer(&self, path: impl AsRef<Path>) -> Result<Transformer, StylesheetError> {
        let path = path.as_ref();
        let meta = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StylesheetError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let modified = meta.modified()?;
        let mut entries = self.entries();
        if let Some(entry) = entries.get(path) {
            if modified <= entry.modified {
                tracing::debug!(path = %path.display(), "stylesheet cache hit");
                return Ok(self.transformer_for(Arc::clone(&entry.template)));
            }
            tracing::debug!(path = %path.display(), "stylesheet changed, recompiling");
        } else {
            tracing::debug!(path = %path.display(), "stylesheet cache miss");
        }
        let source = fs::read(path)?;
        let template = Arc::new(
            self.processor
                .compile(source, Some(path.to_string_lossy().into_owned()))?,
        );
        entries.insert(
            path.to_path_buf(),
            SheetEntry {
                modified,
                template: Arc::clone(&template),
            },
        );
        Ok(self.transformer_for(template))
    }

    /// Transform `xml` with the stylesheet at `path`, writing the result to `out`.
    pub fn transform_file<R: Read, W: Write>(
        &self,
        path: impl AsRef<Path>,
        mut xml: R,
        mut out: W,
        props: Option<&Properties>,
    ) -> Result<(), StylesheetError> {
        let mut transformer = self.new_transformer(path)?;
        if let Some(p) = props {
            set_parameters(&mut transformer, p);
        }
        let mut input = Vec::new();
        xml.read_to_end(&mut input)?;
        out.write_all(&transformer.transform(&input, None)?)?;
        Ok(())
    }

    /// Transform an XML string; input and output use the encoding the document declares.
    pub fn transform_str(
        &self,
        path: impl AsRef<Path>,
        xml: &str,
        props: Option<&Properties>,
    ) -> Result<String, StylesheetError> {
        let encoding = sniff_encoding(xml);
        let charset = charset_for(&encoding)?;
        let mut transformer = self.new_transformer(path)?;
        if let Some(p) = props {
            set_parameters(&mut transformer, p);
        }
        let output = transformer.transform(&charset.encode(xml), None)?;
        Ok(charset.decode(&output))
    }

    /// Transform with a stylesheet read from a stream.
    ///
    /// When `XSLSystemId` names a cached sheet that entry is used and the stream is not read.
    /// `XMLSystemId` is handed to the processor as the document base.
    pub fn transform_stream<X: Read, R: Read>(
        &self,
        mut xsl: X,
        mut xml: R,
        encoding: &str,
        props: &Properties,
    ) -> Result<String, StylesheetError> {
        let xsl_system_id = props.get("XSLSystemId");
        let mut transformer = match xsl_system_id {
            Some(id) if self.is_cached(id) => self.new_transformer(id)?,
            _ => {
                let mut source = Vec::new();
                xsl.read_to_end(&mut source)?;
                let template = self
                    .processor
                    .compile(source, xsl_system_id.map(str::to_string))?;
                self.transformer_for(Arc::new(template))
            }
        };
        set_parameters(&mut transformer, props);
        let mut input = Vec::new();
        xml.read_to_end(&mut input)?;
        let output = transformer.transform(&input, props.get("XMLSystemId"))?;
        Ok(decode_with_label(&output, encoding))
    }

    /// `transform_stream` over an XML string, in the encoding it declares.
    pub fn transform_stream_str<X: Read>(
        &self,
        xsl: X,
        xml: &str,
        props: &Properties,
    ) -> Result<String, StylesheetError> {
        let encoding = sniff_encoding(xml);
        let charset = charset_for(&encoding)?;
        let bytes = charset.encode(xml);
        self.transform_stream(xsl, bytes.as_slice(), &encoding, props)
    }

    /// Validate `xml` against the schema `xsd`. Empty on success, otherwise the error message.
    pub fn validate<X: Read, R: Read>(&self, mut xsd: X, mut xml: R) -> String {
        let mut schema = Vec::new();
        let mut doc = Vec::new();
        if let Err(e) = xsd.read_to_end(&mut schema).and_then(|_| xml.read_to_end(&mut doc)) {
            return e.to_string();
        }
        match self.processor.validate(&schema, &doc) {
            Ok(()) => String::new(),
            Err(message) => message,
        }
    }

    pub fn clear_cache(&self) {
        self.entries().clear();
    }
}
