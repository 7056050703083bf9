//! Assemble numbered piece files into a JSONL manifest.

use crate::pieces::list_text_files;
use anyhow::{Context, Result};
use log::warn;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// A piece as read from disk: file stem and trimmed text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieceRecord {
    pub id: String,
    pub text: String,
}

/// Read every `*.txt` in `dir`, naturally ordered.
pub fn read_chunks(dir: &Path) -> Result<Vec<PieceRecord>> {
    let files = list_text_files(dir)?;
    if files.is_empty() {
        anyhow::bail!("No .txt piece files in {}", dir.display());
    }

    files
        .iter()
        .map(|path| {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(PieceRecord {
                id: path
                    .file_stem()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string(),
                text: text.trim().to_string(),
            })
        })
        .collect()
}

/// One warning per piece longer than `max_chars` characters.
pub fn validate_lengths(records: &[PieceRecord], max_chars: usize) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| {
            let len = record.text.chars().count();
            (len > max_chars).then(|| {
                format!(
                    "{}.txt: {} characters > {}, consider re-splitting",
                    record.id, len, max_chars
                )
            })
        })
        .collect()
}

/// Write `{"id": ..., "text": ...}` per line; non-ASCII stays as is.
pub fn write_jsonl(records: &[PieceRecord], out: &Path) -> Result<()> {
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read, optionally validate, and write the manifest. Returns the line count.
pub fn assemble(in_dir: &Path, out: &Path, max_chars: Option<usize>) -> Result<usize> {
    let records = read_chunks(in_dir)?;

    if let Some(max_chars) = max_chars {
        let warnings = validate_lengths(&records, max_chars);
        for warning in &warnings {
            warn!("{}", warning);
        }
        if !warnings.is_empty() {
            warn!("Total warnings: {}", warnings.len());
        }
    }

    write_jsonl(&records, out)?;
    Ok(records.len())
}
