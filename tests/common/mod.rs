//! Shared fixtures: hand-built PDFs and deterministic fake backends.

#![allow(dead_code)]

use async_trait::async_trait;
use policy_rag::embedding::EmbeddingProvider;
use policy_rag::error::{RagError, Result};
use policy_rag::generation::{Generator, Prompt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Build a PDF with one page per entry. Each page holds its lines as
/// separate text objects; `None` produces a page with no text at all.
///
/// Text must not contain `(`, `)` or `\`.
pub fn policy_pdf(pages: &[Option<&[&str]>]) -> Vec<u8> {
    let page_count = pages.len();
    // 1: catalog, 2: pages, 3: font, then (page, contents) pairs.
    let page_obj = |i: usize| 4 + 2 * i;
    let contents_obj = |i: usize| 5 + 2 * i;
    let total_objects = 3 + 2 * page_count;

    let mut out = Vec::new();
    let mut offsets = vec![0usize; total_objects + 1];
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets[1] = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    offsets[2] = out.len();
    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", page_obj(i))).collect();
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            page_count
        )
        .as_bytes(),
    );

    offsets[3] = out.len();
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );

    for (i, lines) in pages.iter().enumerate() {
        offsets[page_obj(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_obj(i),
                contents_obj(i)
            )
            .as_bytes(),
        );

        let stream: String = lines
            .as_ref()
            .map(|lines| {
                lines
                    .iter()
                    .enumerate()
                    .map(|(n, line)| {
                        format!("BT /F1 12 Tf 72 {} Td ({}) Tj ET\n", 720 - 20 * n, line)
                    })
                    .collect()
            })
            .unwrap_or_default();

        offsets[contents_obj(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}endstream endobj\n",
                contents_obj(i),
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", total_objects + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets.iter().skip(1) {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            total_objects + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// The three-page handbook used across tests; page 2 is blank.
pub fn handbook_pdf() -> Vec<u8> {
    policy_pdf(&[
        Some(&[
            "1. Leave Policy",
            "Permanent employees are entitled to 14 days of annual leave per year.",
            "Unused annual leave can be carried forward up to 7 days.",
        ][..]),
        None,
        Some(&[
            "Section 3 Travel",
            "Economy class airfare is provided for domestic business travel.",
            "Hotel expenses are reimbursed against receipts.",
        ][..]),
    ])
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf29ce484222325u64, |h, b| {
        (h ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

/// Signed feature hashing of lower-cased words. Identical texts get
/// identical vectors; texts without shared words are close to orthogonal.
pub struct HashEmbedder {
    pub calls: Arc<AtomicUsize>,
}

impl HashEmbedder {
    pub const DIMS: usize = 256;

    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; Self::DIMS];
        for word in words(text) {
            let h = fnv1a(&word);
            let sign = if h & 1 == 0 { 1.0 } else { -1.0 };
            v[(h >> 1) as usize % Self::DIMS] += sign;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        Self::DIMS
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }
}

/// Echoes a fixed answer and records every prompt; optionally fails.
pub struct ScriptedGenerator {
    pub answer: String,
    pub fail_with: Option<String>,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedGenerator {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            fail_with: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: String::new(),
            fail_with: Some(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }
    fn model(&self) -> &str {
        "scripted-1"
    }
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        match &self.fail_with {
            Some(message) => Err(RagError::Generation(message.clone())),
            None => Ok(self.answer.clone()),
        }
    }
}
