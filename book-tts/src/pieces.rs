//! Numbered piece files on disk: natural ordering, discovery and writing.

use crate::text::TextPiece;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

static RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+|[^0-9]+").unwrap());

/// One run of a file name: digits compare by value, text case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    Number(String),
    Text(String),
}

impl KeyPart {
    fn number(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        KeyPart::Number(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Leading zeros stripped, so length decides before digits do
            (KeyPart::Number(a), KeyPart::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (KeyPart::Text(a), KeyPart::Text(b)) => a.cmp(b),
            (KeyPart::Number(_), KeyPart::Text(_)) => Ordering::Less,
            (KeyPart::Text(_), KeyPart::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort key for human ordering: `00001.txt < 00010.txt < 000100.txt`.
pub fn natural_key(name: &str) -> Vec<KeyPart> {
    RUNS.find_iter(name)
        .map(|m| {
            let run = m.as_str();
            if run.as_bytes()[0].is_ascii_digit() {
                KeyPart::number(run)
            } else {
                KeyPart::Text(run.to_lowercase())
            }
        })
        .collect()
}

/// Numeric value of a file stem, if it is all digits.
pub fn stem_number(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// All `*.txt` files in `dir`, naturally sorted. Missing directory is an error.
pub fn list_text_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Piece directory not found: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            files.push(path);
        }
    }

    files.sort_by_cached_key(|p| natural_key(&p.file_name().unwrap_or_default().to_string_lossy()));
    Ok(files)
}

/// Write `NNNNN.txt` files, replacing any earlier set in the directory.
pub fn write_pieces(dir: &Path, pieces: &[TextPiece]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    for stale in list_text_files(dir)? {
        fs::remove_file(&stale).with_context(|| format!("Failed to remove {}", stale.display()))?;
    }

    for piece in pieces {
        let path = dir.join(format!("{}.txt", piece.file_stem()));
        fs::write(&path, &piece.text).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}
