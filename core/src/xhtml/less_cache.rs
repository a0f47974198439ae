/*
 * less_cache.rs
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

//! Compiled LESS stylesheets, cached by absolute path.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LessError {
    #[error("lessc failed for {path}: {message}")]
    Compile { path: PathBuf, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub trait LessCompiler: Send + Sync {
    /// Compressed CSS for the LESS file at `path`.
    fn compile(&self, path: &Path) -> Result<String, LessError>;
}

/// Runs `lessc --compress <file>`.
#[derive(Debug, Clone)]
pub struct LesscCommand {
    program: PathBuf,
}

impl Default for LesscCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("lessc"),
        }
    }
}

impl LesscCommand {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl LessCompiler for LesscCommand {
    fn compile(&self, path: &Path) -> Result<String, LessError> {
        let output = Command::new(&self.program)
            .arg("--compress")
            .arg(path)
            .output()?;
        if !output.status.success() {
            return Err(LessError::Compile {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

struct Compiled {
    modified: SystemTime,
    css: String,
}

pub struct LessCache {
    compiler: Box<dyn LessCompiler>,
    entries: Mutex<HashMap<PathBuf, Compiled>>,
}

impl Default for LessCache {
    fn default() -> Self {
        Self::new(Box::new(LesscCommand::default()))
    }
}

impl LessCache {
    pub fn new(compiler: Box<dyn LessCompiler>) -> Self {
        Self {
            compiler,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// CSS for `file`, compiled on first use and again whenever the file is modified.
    pub fn render(&self, file: impl AsRef<Path>) -> Result<String, LessError> {
        let path = fs::canonicalize(file.as_ref())?;
        let modified = fs::metadata(&path)?.modified()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = entries.get(&path).filter(|c| modified <= c.modified) {
            return Ok(hit.css.clone());
        }
        tracing::debug!(path = %path.display(), "compiling LESS");
        let css = self.compiler.compile(&path)?;
        entries.insert(
            path,
            Compiled {
                modified,
                css: css.clone(),
            },
        );
        Ok(css)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
