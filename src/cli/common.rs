//! Helpers shared by the CLI commands.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::compiler::RenderedArchiveRecord;

/// How command results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Read and parse a YAML document, naming `what` in errors.
pub async fn load_yaml<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {} from {}", what, path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {} from {}", what, path.display()))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_record(record: &RenderedArchiveRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Text => {
            println!("{} {}", "blob:".bold(), record.blob_id);
            println!("{} {}", "fingerprint:".bold(), record.fingerprint);
            Ok(())
        }
    }
}
