//! Per-page text extraction from PDF documents.
//!
//! Callers supply the raw bytes and the filename; this module returns the
//! non-empty pages, each tagged with a best-effort section label.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{RagError, Result};
use crate::models::{Document, Page};

/// Section label used when no heading is found on a page.
pub const DEFAULT_SECTION: &str = "General";

/// Number of non-empty lines inspected for a heading.
const HEADING_SCAN_LINES: usize = 5;
/// Headings longer than this are truncated (in characters).
const MAX_HEADING_CHARS: usize = 100;

fn heading_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(chapter|section|article|\d+\.)").expect("valid heading regex")
    })
}

/// Extract the pages of a PDF, dropping pages with no text.
///
/// Fails with [`RagError::Extraction`] if the bytes are not a parseable PDF.
pub fn extract_pages(filename: &str, bytes: &[u8]) -> Result<(Document, Vec<Page>)> {
    let raw_pages =
        pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| RagError::Extraction {
            filename: filename.to_string(),
            message: e.to_string(),
        })?;

    let document = Document {
        filename: filename.to_string(),
        page_count: raw_pages.len(),
    };

    Ok((document, pages_from_text(raw_pages)))
}

/// Number raw page texts from 1, drop blank ones, and attach sections.
pub fn pages_from_text(raw_pages: Vec<String>) -> Vec<Page> {
    raw_pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| Page {
            page_number: (i + 1) as u32,
            section: detect_section(&text),
            text,
        })
        .collect()
}

/// Return the first heading-like line among the first non-empty lines.
pub fn detect_section(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(HEADING_SCAN_LINES)
        .find(|line| heading_pattern().is_match(line))
        .map(|line| line.chars().take(MAX_HEADING_CHARS).collect())
        .unwrap_or_else(|| DEFAULT_SECTION.to_string())
}
