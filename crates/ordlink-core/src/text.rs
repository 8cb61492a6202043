//! Text normalisation and bounded chunking for embedding input.
//!
//! Token counts are approximated as character count / 4, rounded up. The
//! corpus is CJK-dense, where characters-per-token runs close to that ratio;
//! the estimate only has to keep chunks inside provider limits, not bill
//! anyone.

/// Chunking parameters for [`chunk`] and document embedding.
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    /// Budget per chunk, in estimated tokens.
    pub max_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { max_tokens: 500 }
    }
}

/// Collapse whitespace runs to single spaces, newline runs to single
/// newlines, and trim both ends. A run containing any newline collapses to a
/// newline. Idempotent.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut pending_newline = false;
    for ch in text.chars() {
        if ch == '\n' || ch == '\r' {
            pending_newline = true;
        } else if ch.is_whitespace() {
            pending_space = true;
        } else {
            if !out.is_empty() {
                if pending_newline {
                    out.push('\n');
                } else if pending_space {
                    out.push(' ');
                }
            }
            pending_newline = false;
            pending_space = false;
            out.push(ch);
        }
    }
    out
}

/// Estimated token count: ceil(characters / 4). Empty text estimates zero.
pub fn estimate_tokens(text: &str) -> usize {
    token_estimate(text.chars().count())
}

fn token_estimate(chars: usize) -> usize {
    chars.div_ceil(4)
}

/// Split `text` into chunks whose estimated token count stays within
/// `max_tokens`.
///
/// # Algorithm
///
/// Blank-line-delimited paragraphs are normalised and accumulated into a
/// chunk until the next paragraph would overflow the budget, at which point
/// the chunk is emitted and a new one started. A paragraph that alone
/// exceeds the budget is split further on sentence boundaries (`.`, `!`,
/// `?` followed by whitespace) with the same accumulate-and-flush rule.
///
/// This never fails: any input yields at least one chunk, text that fits the
/// budget comes back as exactly one chunk equal to the normalised input, and
/// a single unbreakable sentence is emitted whole even when it exceeds the
/// budget.
pub fn chunk(text: &str, max_tokens: usize) -> Vec<String> {
    let paragraphs = split_paragraphs(text);
    if paragraphs.is_empty() {
        return vec![normalize(text)];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for paragraph in &paragraphs {
        let para_chars = paragraph.chars().count();

        if token_estimate(para_chars) > max_tokens {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            chunks.extend(chunk_sentences(paragraph, max_tokens));
            continue;
        }

        if current.is_empty() {
            current.push_str(paragraph);
            current_chars = para_chars;
        } else if token_estimate(current_chars + 1 + para_chars) > max_tokens {
            chunks.push(std::mem::take(&mut current));
            current.push_str(paragraph);
            current_chars = para_chars;
        } else {
            current.push('\n');
            current.push_str(paragraph);
            current_chars += 1 + para_chars;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Raw text split on blank lines, each paragraph normalised. Whitespace-only
/// input yields no paragraphs.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !lines.is_empty() {
                paragraphs.push(normalize(&lines.join("\n")));
                lines.clear();
            }
        } else {
            lines.push(line);
        }
    }
    if !lines.is_empty() {
        paragraphs.push(normalize(&lines.join("\n")));
    }
    paragraphs
}

fn chunk_sentences(paragraph: &str, max_tokens: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for sentence in split_sentences(paragraph) {
        let sentence_chars = sentence.chars().count();
        if current.is_empty() {
            current.push_str(&sentence);
            current_chars = sentence_chars;
        } else if token_estimate(current_chars + 1 + sentence_chars) > max_tokens {
            chunks.push(std::mem::take(&mut current));
            current.push_str(&sentence);
            current_chars = sentence_chars;
        } else {
            current.push(' ');
            current.push_str(&sentence);
            current_chars += 1 + sentence_chars;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Sentence boundary: terminator punctuation followed by whitespace. The
/// trailing fragment without a terminator is its own sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let indexed: Vec<(usize, char)> = text.char_indices().collect();

    for (i, &(idx, ch)) in indexed.iter().enumerate() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let followed_by_space = indexed
            .get(i + 1)
            .is_some_and(|&(_, next)| next.is_whitespace());
        if followed_by_space {
            let end = idx + ch.len_utf8();
            let piece = text[start..end].trim();
            if !piece.is_empty() {
                sentences.push(piece.to_string());
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}
