//! Batch synthesis over a directory of numbered piece files.

use crate::pieces::{list_text_files, stem_number};
use crate::tts::{SynthesisError, SynthesisRequest, Synthesizer, VoiceOptions};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Default pause after each synthesis call.
pub const DEFAULT_RATE_LIMIT_SLEEP: Duration = Duration::from_millis(200);

/// Settings shared by every piece of a run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub voice: VoiceOptions,
    /// Pause after every synthesis attempt
    pub sleep: Duration,
}

/// One piece that could not be synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub synthesized: usize,
    pub skipped: usize,
    pub failures: Vec<Failure>,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Piece files to synthesize: naturally ordered, numeric stem `>= start`
/// when `start > 1`, at most `limit` files when `limit > 0`.
pub fn select_inputs(in_dir: &Path, start: u64, limit: usize) -> Result<Vec<PathBuf>> {
    let mut files = list_text_files(in_dir)?;
    if files.is_empty() {
        anyhow::bail!("No .txt files in {}", in_dir.display());
    }

    if start > 1 {
        files.retain(|path| stem_number(path).is_some_and(|n| n >= start));
    }
    if limit > 0 {
        files.truncate(limit);
    }
    Ok(files)
}

/// Target audio path for a piece file.
pub fn target_path(input: &Path, out_dir: &Path, extension: &str) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    out_dir.join(format!("{}.{}", stem, extension))
}

/// Write through a temp file in the target directory, then rename over the target.
fn persist_atomic(target: &Path, audio: &[u8]) -> Result<(), SynthesisError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(audio)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Trimmed piece text; empty pieces never reach the service.
fn read_piece(input: &Path) -> Result<String> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("Empty text");
    }
    Ok(text.to_string())
}

/// Run every input through the synthesizer in order.
///
/// Existing targets are skipped, so a rerun only fills the gaps. Per-piece
/// failures are logged and collected; only an unusable output directory
/// aborts the run.
pub async fn run_batch(
    synthesizer: &dyn Synthesizer,
    inputs: &[PathBuf],
    out_dir: &Path,
    options: &BatchOptions,
) -> Result<BatchSummary> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let extension = options.voice.container.extension();
    let total = inputs.len();
    let mut summary = BatchSummary::default();

    info!(
        "Files to synthesize: {} (voice={}, speed={}, container={})",
        total, options.voice.voice, options.voice.speed, options.voice.container
    );

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    for (i, input) in inputs.iter().enumerate() {
        let target = target_path(input, out_dir, extension);
        let name = target
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        pb.set_message(name.clone());

        if target.exists() {
            info!("[{}/{}] SKIP {} (already exists)", i + 1, total, name);
            summary.skipped += 1;
            pb.inc(1);
            continue;
        }

        let input_name = input
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let outcome = match read_piece(input) {
            Ok(text) => {
                let request = SynthesisRequest::new(text, &options.voice);
                let result = synthesizer.synthesize(&request).await;
                let outcome = result.map_err(anyhow::Error::from).and_then(|audio| {
                    persist_atomic(&target, &audio)
                        .with_context(|| format!("Failed to write {}", target.display()))?;
                    Ok(audio.len())
                });
                tokio::time::sleep(options.sleep).await;
                outcome
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(bytes) => {
                info!("[{}/{}] OK {} ({} bytes)", i + 1, total, name, bytes);
                summary.synthesized += 1;
            }
            Err(e) => {
                error!("[{}/{}] FAIL {}: {:#}", i + 1, total, input_name, e);
                summary.failures.push(Failure {
                    name: input_name,
                    error: format!("{:#}", e),
                });
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Done: {} synthesized, {} skipped, {} failed -> {}",
        summary.synthesized,
        summary.skipped,
        summary.failures.len(),
        out_dir.display()
    );

    Ok(summary)
}
