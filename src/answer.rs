//! Grounded answer composition.
//!
//! Turns the surviving chunks of a retrieval into a prompt, calls the
//! generator once, and packages the completion with de-duplicated source
//! citations. Generation failures never escape [`AnswerComposer::compose`]:
//! they become the answer text, so callers always get a [`Response`].

use std::collections::HashSet;
use std::sync::Arc;

use crate::generation::{Generator, Prompt};
use crate::models::{Confidence, Response, SearchResult, Source};

/// Answer used when the index has nothing for the question.
pub const NOT_FOUND: &str = "I could not find this information in the provided documents.";

/// Answer used when every hit fell below the similarity threshold.
pub const LOW_CONFIDENCE: &str = "Sorry, I cannot retrieve relevant information from the documents. Please upload a more clear or complete version.";

pub const SYSTEM_PROMPT: &str = r#"You are an enterprise Document-QA Assistant. Your job is to answer user questions strictly based on the information extracted from the uploaded PDF documents (HR policies, company rules, contracts, procedures, SOPs, guidelines, etc.).

**CRITICAL RULES:**

1. ONLY use information from the provided CONTEXT (extracted from PDF documents)
2. If the answer is NOT in the context, respond: "I could not find this information in the provided documents."
3. NEVER guess or use external knowledge
4. NEVER hallucinate or make assumptions
5. Be strictly factual, neutral, and professional
6. NEVER rewrite or reinterpret policy meanings

**When answering:**
- Provide clear, concise answers in simple language
- Give exact policy rules, clauses, or guidelines
- Mention the source (document name, section, page number)
- If multiple relevant sections exist, summarize all of them

**Supported topics:**
- HR Policies & Procedures
- Leave policies
- Travel entitlement
- Payroll rules
- Employee benefits
- Medical coverage
- Company guidelines
- Compliance documents
- SOPs
- Contracts or agreements"#;

const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Render chunks as labelled source blocks, in the order given.
pub fn build_context(chunks: &[SearchResult]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Source {}: {} | Page {} | Section: {}]\n{}\n",
                i + 1,
                chunk.metadata.filename,
                chunk.metadata.page_number,
                chunk.metadata.section,
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn build_user_prompt(question: &str, context: &str) -> String {
    format!(
        r#"CONTEXT (from PDF documents):
{context}

---

USER QUESTION:
{question}

---

Provide your answer following these rules:
- Answer ONLY the question asked, using ONLY the CONTEXT provided above
- If the answer is not in the context, say: "{NOT_FOUND}"
- Mention the specific document, section, or page where you found the information
- Be clear, concise, and factual"#
    )
}

/// One [`Source`] per `(filename, page, section)`, first occurrence wins.
pub fn dedup_sources(chunks: &[SearchResult]) -> Vec<Source> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| {
            seen.insert((
                c.metadata.filename.as_str(),
                c.metadata.page_number,
                c.metadata.section.as_str(),
            ))
        })
        .map(|c| Source {
            document: c.metadata.filename.clone(),
            page: c.metadata.page_number,
            section: c.metadata.section.clone(),
            similarity: c.similarity_score,
        })
        .collect()
}

pub fn no_results_response() -> Response {
    fixed_response(NOT_FOUND)
}

pub fn low_confidence_response() -> Response {
    fixed_response(LOW_CONFIDENCE)
}

fn fixed_response(answer: &str) -> Response {
    Response {
        answer: answer.to_string(),
        sources: Vec::new(),
        confidence: Confidence::Low,
        context_chunks: 0,
    }
}

/// Human-readable rendering used by the CLI.
pub fn format_response(response: &Response) -> String {
    let mut out = vec!["ANSWER:".to_string(), response.answer.clone(), String::new()];

    if !response.sources.is_empty() {
        out.push("SOURCE (Matched from PDF):".to_string());
        for source in &response.sources {
            out.push(format!(
                "  • {} | Page {} | Section: {} | Relevance: {:.2}%",
                source.document,
                source.page,
                source.section,
                source.similarity * 100.0
            ));
        }
        out.push(String::new());
    }

    out.push(format!("CONFIDENCE: {}", response.confidence));
    out.join("\n")
}

pub struct AnswerComposer {
    generator: Arc<dyn Generator>,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    pub fn prompt_for(question: &str, chunks: &[SearchResult]) -> Prompt {
        Prompt {
            system: SYSTEM_PROMPT.to_string(),
            user: build_user_prompt(question, &build_context(chunks)),
        }
    }

    pub async fn compose(
        &self,
        question: &str,
        chunks: &[SearchResult],
        confidence: Confidence,
    ) -> Response {
        let prompt = Self::prompt_for(question, chunks);

        let answer = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    generator = self.generator.name(),
                    model = self.generator.model(),
                    error = %e,
                    "generation failed"
                );
                format!("Error generating response: {}", e)
            }
        };

        Response {
            answer,
            sources: dedup_sources(chunks),
            confidence,
            context_chunks: chunks.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RagError, Result};
    use crate::models::ChunkMetadata;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn chunk(file: &str, page: u32, section: &str, score: f64, text: &str) -> SearchResult {
        SearchResult {
            text: text.to_string(),
            metadata: ChunkMetadata {
                filename: file.to_string(),
                page_number: page,
                section: section.to_string(),
                chunk_index: 0,
            },
            similarity_score: score,
        }
    }

    struct Recording {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<Prompt>>,
    }

    #[async_trait]
    impl Generator for Recording {
        fn name(&self) -> &str {
            "recording"
        }
        fn model(&self) -> &str {
            "test"
        }
        async fn generate(&self, prompt: &Prompt) -> Result<String> {
            self.seen.lock().unwrap().push(prompt.clone());
            self.reply.clone().map_err(RagError::Generation)
        }
    }

    #[test]
    fn test_context_headers_and_separator() {
        let ctx = build_context(&[
            chunk("hr.pdf", 2, "1. LEAVE POLICY", 0.9, "14 days annual leave"),
            chunk("travel.pdf", 5, "General", 0.7, "Economy class"),
        ]);
        assert_eq!(
            ctx,
            "[Source 1: hr.pdf | Page 2 | Section: 1. LEAVE POLICY]\n14 days annual leave\n\
             \n---\n\
             [Source 2: travel.pdf | Page 5 | Section: General]\nEconomy class\n"
        );
    }

    #[test]
    fn test_user_prompt_embeds_question_and_fallback() {
        let prompt = build_user_prompt("How many sick days?", "CTX");
        assert!(prompt.contains("CTX"));
        assert!(prompt.contains("USER QUESTION:\nHow many sick days?"));
        assert!(prompt.contains(NOT_FOUND));
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let sources = dedup_sources(&[
            chunk("hr.pdf", 1, "A", 0.9, "x"),
            chunk("hr.pdf", 1, "B", 0.8, "y"),
            chunk("hr.pdf", 1, "A", 0.7, "z"),
            chunk("hr.pdf", 2, "A", 0.6, "w"),
        ]);
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].section, "A");
        assert_eq!(sources[0].similarity, 0.9);
        assert_eq!(sources[1].section, "B");
        assert_eq!(sources[2].page, 2);
    }

    #[test]
    fn test_fixed_responses() {
        let r = no_results_response();
        assert_eq!(r.answer, NOT_FOUND);
        assert!(r.sources.is_empty());
        assert_eq!(r.confidence, Confidence::Low);
        assert_eq!(r.context_chunks, 0);
        assert_eq!(low_confidence_response().answer, LOW_CONFIDENCE);
    }

    #[test]
    fn test_format_response_layout() {
        let response = Response {
            answer: "14 days.".to_string(),
            sources: vec![Source {
                document: "hr.pdf".to_string(),
                page: 3,
                section: "General".to_string(),
                similarity: 0.8765,
            }],
            confidence: Confidence::High,
            context_chunks: 1,
        };
        let text = format_response(&response);
        assert!(text.starts_with("ANSWER:\n14 days.\n"));
        assert!(text.contains("SOURCE (Matched from PDF):"));
        assert!(text.contains("hr.pdf | Page 3 | Section: General | Relevance: 87.65%"));
        assert!(text.ends_with("CONFIDENCE: High"));
    }

    #[test]
    fn test_format_response_without_sources() {
        let text = format_response(&no_results_response());
        assert!(!text.contains("SOURCE"));
        assert!(text.ends_with("CONFIDENCE: Low"));
    }

    #[tokio::test]
    async fn test_compose_success() {
        let generator = Arc::new(Recording {
            reply: Ok("Employees get 14 days.".to_string()),
            seen: Mutex::new(Vec::new()),
        });
        let composer = AnswerComposer::new(generator.clone());
        let chunks = vec![
            chunk("hr.pdf", 1, "A", 0.9, "14 days"),
            chunk("hr.pdf", 1, "A", 0.8, "more"),
        ];
        let response = composer
            .compose("annual leave?", &chunks, Confidence::High)
            .await;
        assert_eq!(response.answer, "Employees get 14 days.");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.context_chunks, 2);
        assert_eq!(response.confidence, Confidence::High);

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].system, SYSTEM_PROMPT);
        assert!(seen[0].user.contains("[Source 2: hr.pdf | Page 1 | Section: A]"));
    }

    #[tokio::test]
    async fn test_compose_absorbs_generation_error() {
        let composer = AnswerComposer::new(Arc::new(Recording {
            reply: Err("quota exceeded".to_string()),
            seen: Mutex::new(Vec::new()),
        }));
        let chunks = vec![chunk("hr.pdf", 4, "General", 0.55, "text")];
        let response = composer.compose("q", &chunks, Confidence::Medium).await;
        assert!(response.answer.starts_with("Error generating response:"));
        assert!(response.answer.contains("quota exceeded"));
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.confidence, Confidence::Medium);
    }
}
