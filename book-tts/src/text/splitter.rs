//! Character-bounded splitting of cleaned text into TTS pieces.
//!
//! Lengths are counted in Unicode scalar values, so a Cyrillic letter costs the
//! same as an ASCII one.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default SpeechKit piece size in characters.
pub const DEFAULT_MAX_CHARS: usize = 200;

/// A paragraph break, or whitespace after sentence-ending punctuation.
static BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\n+|[.!?:;]\s+").unwrap());

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split text into trimmed, non-empty pieces of at most `max_chars` characters.
///
/// Sentences and paragraphs are packed together while they fit. A sentence that
/// is too long on its own is packed word by word; a single word longer than
/// `max_chars` is emitted whole.
pub fn split_for_tts(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut out = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0;

    for piece in candidate_pieces(text) {
        let piece_len = char_len(&piece);

        if !buffer.is_empty() {
            if buffer_len + 1 + piece_len <= max_chars {
                buffer.push(' ');
                buffer.push_str(&piece);
                buffer_len += 1 + piece_len;
                continue;
            }
            out.push(std::mem::take(&mut buffer));
        }

        buffer = seed_buffer(piece, piece_len, max_chars, &mut out);
        buffer_len = char_len(&buffer);
    }

    if !buffer.is_empty() {
        out.push(buffer);
    }

    out
}

/// Sentence and paragraph candidates in source order, newlines folded to spaces.
fn candidate_pieces(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for boundary in BOUNDARY.find_iter(text) {
        // Sentence punctuation is ASCII and stays with the sentence it ends
        let cut = if boundary.as_str().starts_with('\n') {
            boundary.start()
        } else {
            boundary.start() + 1
        };
        push_normalized(&mut pieces, &text[start..cut]);
        start = boundary.end();
    }
    push_normalized(&mut pieces, &text[start..]);

    pieces
}

fn push_normalized(pieces: &mut Vec<String>, raw: &str) {
    let piece = raw.replace('\n', " ");
    let piece = piece.trim();
    if !piece.is_empty() {
        pieces.push(piece.to_string());
    }
}

/// Start a new buffer with `piece`, word-packing it when it alone overflows.
///
/// Full word-packed pieces go straight to `out`; the last partial one is
/// returned as the new buffer so following sentences can join it.
fn seed_buffer(piece: String, piece_len: usize, max_chars: usize, out: &mut Vec<String>) -> String {
    if piece_len <= max_chars {
        return piece;
    }

    let mut packed = split_on_words(&piece, max_chars);
    let last = packed.pop().unwrap_or_default();
    out.extend(packed);
    last
}

/// Greedily join words with single spaces up to `max_chars`.
fn split_on_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = char_len(word);
        if current.is_empty() {
            current = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current = word.to_string();
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
