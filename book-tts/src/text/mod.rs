//! Text processing: token counting, token-bounded chunking for the cleaning
//! pass, and character-bounded splitting for synthesis.

pub mod chunker;
pub mod normalize;
pub mod splitter;
pub mod tokens;

pub use chunker::{TokenChunk, chunk_by_tokens};
pub use normalize::soft_normalize;
pub use splitter::split_for_tts;
pub use tokens::{TokenCounter, load_counter};

/// A TTS-ready piece and its 1-based position in the book.
#[derive(Debug, Clone)]
pub struct TextPiece {
    pub index: usize,
    pub text: String,
}

impl TextPiece {
    pub fn new(index: usize, text: String) -> Self {
        Self { index, text }
    }

    /// Zero-padded file stem, e.g. `00042`.
    pub fn file_stem(&self) -> String {
        format!("{:05}", self.index)
    }
}

/// Number pieces from 1 in source order.
pub fn number_pieces(pieces: Vec<String>) -> Vec<TextPiece> {
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| TextPiece::new(i + 1, text))
        .collect()
}
