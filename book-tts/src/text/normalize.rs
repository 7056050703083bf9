//! Light normalization of raw book text before chunking.

use once_cell::sync::Lazy;
use regex::Regex;

static LINE_ENDING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n?").unwrap());
static TRAILING_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").unwrap());

/// Strip the BOM, convert CRLF/CR to LF and drop spaces/tabs at line ends.
///
/// Everything else (hyphenation, headers, page numbers) is left to the LLM.
pub fn soft_normalize(text: &str) -> String {
    let text = text.replace('\u{feff}', "");
    let text = LINE_ENDING.replace_all(&text, "\n");
    TRAILING_BLANKS.replace_all(&text, "\n").into_owned()
}
