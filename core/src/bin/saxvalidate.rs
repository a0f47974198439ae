/*
 * saxvalidate.rs
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

//! Command-line XML checker: well-formedness, plus an XML Schema when `-s` names one.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ritagli_core::xhtml::SaxValidator;

#[derive(Parser)]
#[command(name = "saxvalidate", about = "Check that an XML file is well formed and optionally schema valid", version)]
struct Cli {
    /// XML Schema to validate against.
    #[arg(short = 's', long = "schema", value_name = "XSD")]
    schema: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Document to check.
    xmlfile: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default = if cli.verbose { "ritagli_core=debug" } else { "ritagli_core=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();

    let file = match File::open(&cli.xmlfile) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("ERROR: {}: {}", cli.xmlfile.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let mut validator = SaxValidator::new(cli.schema.is_some());
    if let Some(xsd) = &cli.schema {
        validator = validator.with_schema_path(xsd);
    }
    let mut stdout = io::stdout().lock();
    match validator.run(BufReader::new(file), &mut stdout) {
        Ok(true) => {
            tracing::info!(file = %cli.xmlfile.display(), "document is valid");
            ExitCode::SUCCESS
        }
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}
