//! Token-window chunker.
//!
//! Splits page text into overlapping windows of at most `chunk_size`
//! tokens, using the `cl100k_base` BPE vocabulary. Each window starts
//! `chunk_size - chunk_overlap` tokens after the previous one, so
//! consecutive chunks of a page share `chunk_overlap` tokens; the last
//! window of a page may be shorter.
//!
//! Chunk ids run across the whole document (they are not reset per page)
//! and chunking is a pure function of the input text and the two sizes.

use regex::Regex;
use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;

use crate::error::{RagError, Result};
use crate::models::{Chunk, ChunkMetadata, Page};

/// How far a window edge may move to avoid splitting a multi-byte character.
const MAX_BOUNDARY_NUDGE: usize = 3;

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[^\w\s.,;:\-()\[\]/&%$#@!?]").expect("valid allow-list regex")
    })
}

/// Normalize chunk text: collapse whitespace, strip characters outside the
/// allow-list, and trim.
pub fn clean_text(text: &str) -> String {
    let collapsed = whitespace_run().replace_all(text, " ");
    let stripped = disallowed_chars().replace_all(&collapsed, "");
    stripped.trim().to_string()
}

pub struct Chunker {
    bpe: CoreBPE,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be > 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| RagError::Config(format!("failed to load cl100k_base: {}", e)))?;
        Ok(Self {
            bpe,
            chunk_size,
            chunk_overlap,
        })
    }

    /// Chunk every page of one document.
    pub fn chunk_pages(&self, pages: &[Page], filename: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut next_id: u64 = 0;

        for page in pages {
            for (text, token_count) in self.split_page(&page.text) {
                chunks.push(Chunk {
                    chunk_id: next_id,
                    text,
                    token_count,
                    metadata: ChunkMetadata {
                        filename: filename.to_string(),
                        page_number: page.page_number,
                        section: page.section.clone(),
                        chunk_index: next_id,
                    },
                });
                next_id += 1;
            }
        }

        chunks
    }

    /// Split one page into cleaned, non-empty `(text, token_count)` windows.
    fn split_page(&self, text: &str) -> Vec<(String, usize)> {
        let tokens = self.bpe.encode_ordinary(text);
        let len = tokens.len();
        let decode = |s: usize, e: usize| self.bpe.decode(tokens[s..e].to_vec()).ok();

        let mut windows = Vec::new();
        let mut start = 0;

        while start < len {
            let end = (start + self.chunk_size).min(len);

            // Find the nearest decodable window inside [start, end).
            let mut decoded = None;
            'search: for shrink in 0..=MAX_BOUNDARY_NUDGE {
                for skip in 0..=MAX_BOUNDARY_NUDGE {
                    let (s, e) = (start + skip, end.saturating_sub(shrink));
                    if s >= e {
                        continue;
                    }
                    if let Some(text) = decode(s, e) {
                        decoded = Some((s, e, text));
                        break 'search;
                    }
                }
            }

            let window_end = match decoded {
                Some((s, e, text)) => {
                    let cleaned = clean_text(&text);
                    if !cleaned.is_empty() {
                        windows.push((cleaned, e - s));
                    }
                    e
                }
                None => end,
            };

            if end >= len {
                break;
            }
            // Always make progress, even if the nudge ate into the overlap.
            start = window_end.saturating_sub(self.chunk_overlap).max(start + 1);
        }

        windows
    }
}
