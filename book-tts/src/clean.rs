//! LLM cleaning pass and the clean-and-split stage.

use crate::pieces::write_pieces;
use crate::text::{TokenCounter, chunk_by_tokens, number_pieces, soft_normalize, split_for_tts};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use llm_client::{LlmProvider, LlmRequest};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

pub const CLEANED_FILE: &str = "cleaned_full.txt";
pub const PIECES_DIR: &str = "speechkit_chunks";

/// Fixed instruction sent with every chunk.
pub const CLEAN_PROMPT: &str = "\
You clean book text before it is read aloud by a speech synthesizer.

TASK: turn the input fragment of a book into continuous, coherent literary text for TTS. Answer in the language of the input.

REMOVE STRICTLY:
- Page numbers, running headers and footers, titles or subtitles repeated on every page.
- Every artifact of a broken PDF to TXT conversion: lone digits, random digits mid-sentence, markup remnants, footnote numbers, asterisks (*).
- Line breaks inside paragraphs: join the lines.
- Words split by hyphenation: \"compu- \\n ter\" becomes \"computer\".
- Repeated spaces and tabs; normalize dashes and quotation marks.
- More than one blank line in a row: collapse to one.

KEEP:
- The main literary text.
- Punctuation and paragraphs.
- Numbers that belong to the content (years, the author's own lists), but NOT headers or footnotes.

OUTPUT: only the clean text, with no comments or prefixes.
";

/// Sends chunks through an LLM with the cleaning instruction.
pub struct Cleaner {
    provider: Box<dyn LlmProvider>,
}

impl Cleaner {
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Cleaned text of one chunk, trimmed.
    pub async fn clean(&self, chunk: &str) -> Result<String> {
        let response = self
            .provider
            .complete(LlmRequest::with_system(chunk, CLEAN_PROMPT))
            .await
            .with_context(|| format!("{} failed to clean chunk", self.provider.name()))?;
        Ok(response.content.trim().to_string())
    }
}

/// Budgets for the stage.
#[derive(Debug, Clone, Copy)]
pub struct StageLimits {
    pub max_content_tokens: usize,
    pub max_chars: usize,
}

/// What the stage wrote.
#[derive(Debug)]
pub struct CleanReport {
    pub chunks: usize,
    pub cleaned_path: PathBuf,
    pub cleaned_chars: usize,
    pub pieces_dir: PathBuf,
    pub pieces: usize,
}

/// Split cleaned text and write numbered piece files; returns the piece count.
pub fn split_to_pieces(cleaned: &str, pieces_dir: &Path, max_chars: usize) -> Result<usize> {
    let pieces = number_pieces(split_for_tts(cleaned, max_chars));
    write_pieces(pieces_dir, &pieces)?;
    info!("TTS pieces: {} -> {}", pieces.len(), pieces_dir.display());
    Ok(pieces.len())
}

/// Read the book, clean it chunk by chunk, write `cleaned_full.txt` and the
/// piece files under `out_dir`. Any cleaning failure aborts the stage.
pub async fn clean_book(
    book: &Path,
    out_dir: &Path,
    limits: StageLimits,
    counter: &dyn TokenCounter,
    cleaner: &Cleaner,
) -> Result<CleanReport> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let raw = fs::read_to_string(book)
        .with_context(|| format!("Failed to read book: {}", book.display()))?;
    let text = soft_normalize(&raw);

    let chunks = chunk_by_tokens(&text, limits.max_content_tokens, counter);
    info!("Source text: {} characters", text.chars().count());
    info!(
        "Chunks to clean: {} (token counter: {}, provider: {})",
        chunks.len(),
        counter.describe(),
        cleaner.provider_name()
    );

    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut cleaned_chunks = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        info!(
            "[{}/{}] {} tokens, {} characters",
            i + 1,
            chunks.len(),
            chunk.tokens,
            chunk.text.chars().count()
        );
        let cleaned = cleaner
            .clean(&chunk.text)
            .await
            .with_context(|| format!("Cleaning chunk {}/{}", i + 1, chunks.len()))?;
        cleaned_chunks.push(cleaned);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let cleaned = cleaned_chunks.join("\n\n").trim().to_string();
    let cleaned_path = out_dir.join(CLEANED_FILE);
    fs::write(&cleaned_path, &cleaned)
        .with_context(|| format!("Failed to write {}", cleaned_path.display()))?;
    let cleaned_chars = cleaned.chars().count();
    info!("Cleaned: {} ({} characters)", cleaned_path.display(), cleaned_chars);

    let pieces_dir = out_dir.join(PIECES_DIR);
    let pieces = split_to_pieces(&cleaned, &pieces_dir, limits.max_chars)?;

    Ok(CleanReport {
        chunks: chunks.len(),
        cleaned_path,
        cleaned_chars,
        pieces_dir,
        pieces,
    })
}
