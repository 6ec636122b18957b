//! Question → relevant chunks.
//!
//! A query runs three sequential steps: optional synonym expansion, one
//! embedding call, one index search. The hits are then gated by the
//! similarity threshold and the survivors are given a confidence label from
//! the single best score.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::models::{Confidence, SearchResult};
use crate::store::VectorIndex;

/// Built-in policy vocabulary: trigger substring → appended terms.
const POLICY_VOCABULARY: &[(&str, &[&str])] = &[
    ("leave", &["leave policy", "annual leave", "sick leave", "casual leave", "entitlement", "days off"]),
    ("vacation", &["annual leave", "paid time off"]),
    ("salary", &["salary", "payroll", "compensation", "pay structure"]),
    ("pay", &["payroll", "compensation"]),
    ("travel", &["travel policy", "travel allowance", "reimbursement", "per diem"]),
    ("medical", &["medical coverage", "health insurance", "medical benefits"]),
    ("resign", &["resignation", "notice period", "termination"]),
    ("notice", &["notice period", "resignation"]),
    ("remote", &["remote work", "work from home", "telecommuting"]),
    ("work from home", &["remote work", "work from home"]),
    ("maternity", &["maternity leave", "parental leave"]),
    ("paternity", &["paternity leave", "parental leave"]),
    ("overtime", &["overtime", "extra hours", "overtime compensation"]),
    ("probation", &["probation period", "confirmation"]),
];

/// Appends domain vocabulary to terse questions.
///
/// Triggers match case-insensitively anywhere in the question. Terms already
/// present in the question are not repeated, and the original wording is
/// always kept as a prefix.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    rules: Vec<(String, Vec<String>)>,
}

impl QueryExpander {
    pub fn builtin() -> Self {
        let rules = POLICY_VOCABULARY
            .iter()
            .map(|(trigger, terms)| {
                (
                    trigger.to_string(),
                    terms.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();
        Self { rules }
    }

    /// The built-in vocabulary plus `extra`. Extra terms for an existing
    /// trigger are added after the built-in ones.
    pub fn with_synonyms(extra: &BTreeMap<String, Vec<String>>) -> Self {
        let mut expander = Self::builtin();
        for (trigger, terms) in extra {
            let trigger = trigger.to_lowercase();
            match expander.rules.iter_mut().find(|(t, _)| *t == trigger) {
                Some((_, existing)) => existing.extend(terms.iter().cloned()),
                None => expander.rules.push((trigger, terms.clone())),
            }
        }
        expander
    }

    pub fn expand(&self, question: &str) -> String {
        let lower = question.to_lowercase();
        let mut added: Vec<&str> = Vec::new();

        for (trigger, terms) in &self.rules {
            if !lower.contains(trigger.as_str()) {
                continue;
            }
            for term in terms {
                let term_lower = term.to_lowercase();
                if lower.contains(&term_lower)
                    || added.iter().any(|a| a.to_lowercase() == term_lower)
                {
                    continue;
                }
                added.push(term);
            }
        }

        if added.is_empty() {
            question.to_string()
        } else {
            format!("{} {}", question, added.join(" "))
        }
    }
}

/// Keep hits whose score is at least `threshold`, preserving order.
pub fn filter_by_threshold(results: Vec<SearchResult>, threshold: f64) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|r| r.similarity_score >= threshold)
        .collect()
}

/// Label by the best score: `High` at or above `high`, `Medium` at or above
/// `medium`, else `Low`.
pub fn classify_confidence(max_score: f64, high: f64, medium: f64) -> Confidence {
    if max_score >= high {
        Confidence::High
    } else if max_score >= medium {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Outcome of one retrieval.
#[derive(Debug, Clone)]
pub enum Retrieval {
    /// The index returned nothing.
    NoResults,
    /// Hits existed but none reached the threshold.
    BelowThreshold { best_score: f64 },
    /// Surviving chunks, most similar first.
    Relevant {
        chunks: Vec<SearchResult>,
        confidence: Confidence,
    },
}

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    expander: Option<QueryExpander>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Self {
        let expander = config
            .query_expansion
            .then(|| QueryExpander::with_synonyms(&config.synonyms));
        Self {
            embedder,
            index,
            expander,
            config,
        }
    }

    /// Embedding and index failures abort the query and are returned as-is.
    pub async fn retrieve(&self, question: &str) -> Result<Retrieval> {
        let query_text = match &self.expander {
            Some(expander) => expander.expand(question),
            None => question.to_string(),
        };
        if query_text != question {
            tracing::debug!(expanded = %query_text, "query expanded");
        }

        let vector = self.embedder.embed(&query_text).await?;
        let results = self.index.query(&vector, self.config.top_k).await?;

        if results.is_empty() {
            tracing::info!("no search results");
            return Ok(Retrieval::NoResults);
        }

        let best_score = results
            .iter()
            .map(|r| r.similarity_score)
            .fold(f64::MIN, f64::max);
        let hits = results.len();
        let chunks = filter_by_threshold(results, self.config.similarity_threshold);

        if chunks.is_empty() {
            tracing::info!(
                hits,
                best_score,
                threshold = self.config.similarity_threshold,
                "all results below similarity threshold"
            );
            return Ok(Retrieval::BelowThreshold { best_score });
        }

        let confidence = classify_confidence(
            best_score,
            self.config.confidence_high,
            self.config.confidence_medium,
        );
        tracing::info!(hits, kept = chunks.len(), best_score, %confidence, "retrieved");

        Ok(Retrieval::Relevant { chunks, confidence })
    }
}
