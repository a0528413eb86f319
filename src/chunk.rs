//! Sliding-window word chunker.
//!
//! Splits cleaned document text into overlapping [`Chunk`]s. Sizes are
//! configured in characters and converted to word counts using a fixed
//! average word length.
//!
//! # Algorithm
//!
//! 1. `words_per_chunk = chunk_size / 5`, `overlap_words = overlap / 5`.
//! 2. Take `words_per_chunk` words starting at `start`.
//! 3. Advance `start` by `words_per_chunk - overlap_words`, but always by at
//!    least one word.
//! 4. Stop once a window reaches the last word.
//!
//! Character offsets are estimated by summing `word_len + 1` over the
//! preceding words. They diverge from the source file wherever whitespace
//! was collapsed during cleaning, so treat them as ordering hints.
//!
//! # Example
//!
//! ```rust
//! use contract_rag::chunk::chunk_text;
//!
//! let chunks = chunk_text("prazo de vigência de 24 meses", 1000, 200).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].section_id, "chunk_1");
//! ```

use crate::error::{Error, Result};
use crate::models::Chunk;

/// Average characters per word used to turn character sizes into word counts.
pub const AVG_WORD_LEN: usize = 5;

/// Split `text` into overlapping word windows.
///
/// Chunk ids are `chunk_1`, `chunk_2`, … in order. Empty (or all-whitespace)
/// text yields no chunks.
///
/// # Errors
///
/// [`Error::Configuration`] when `chunk_size` is too small to hold a single
/// word.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let words_per_chunk = chunk_size / AVG_WORD_LEN;
    if words_per_chunk == 0 {
        return Err(Error::Configuration(format!(
            "chunk size {} is smaller than one word ({} chars)",
            chunk_size, AVG_WORD_LEN
        )));
    }
    let overlap_words = overlap / AVG_WORD_LEN;

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let text_len = text.chars().count();
    let offsets = word_offsets(&words);
    let char_position = |word_idx: usize| -> usize {
        if word_idx >= words.len() {
            text_len
        } else {
            offsets[word_idx].min(text_len)
        }
    };

    let step = words_per_chunk.saturating_sub(overlap_words).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_num = 1usize;

    loop {
        let end = (start + words_per_chunk).min(words.len());
        chunks.push(Chunk {
            section_id: format!("chunk_{}", chunk_num),
            content: words[start..end].join(" "),
            page_number: None,
            start_char: Some(char_position(start)),
            end_char: Some(char_position(end - 1)),
            relevance_score: None,
        });

        if end >= words.len() {
            break;
        }
        start += step;
        chunk_num += 1;
    }

    Ok(chunks)
}

/// Estimated character offset of each word: the sum of `len + 1` over all
/// preceding words.
fn word_offsets(words: &[&str]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(words.len());
    let mut pos = 0usize;
    for w in words {
        offsets.push(pos);
        pos += w.chars().count() + 1;
    }
    offsets
}
