//! Deterministic local completion provider.
//!
//! No model call: facts come from sentence splitting and the strand from
//! keyword voting. The output matches the JSON shape the extractor
//! expects from any completion backend, so the extractor cannot tell the
//! backends apart.

use async_trait::async_trait;
use serde_json::json;

use crate::error::Result;
use crate::extractor::provider::CompletionProvider;
use crate::memory::types::Strand;

/// Pronouns that mark the start of a new clause after "and", e.g.
/// "I love hiking and I enjoy cooking" splits into two facts.
const CLAUSE_SUBJECTS: &[&str] = &["i", "we", "they", "he", "she", "my", "our"];

const PREFERENTIAL_MARKERS: &[&str] = &[
    "love", "like", "prefer", "favorite", "favourite", "enjoy", "hate", "dislike", "want",
];
const RELATIONAL_MARKERS: &[&str] = &[
    "friend", "brother", "sister", "mother", "father", "wife", "husband", "partner", "colleague",
    "coworker", "boss", "neighbor",
];
const PROCEDURAL_MARKERS: &[&str] = &["how to", "step", "steps", "install", "configure", "recipe"];
const EXPERIENTIAL_MARKERS: &[&str] = &[
    "yesterday", "today", "went", "visited", "attended", "happened", "met", "tried",
];
const FACTUAL_MARKERS: &[&str] = &["is a", "are a", "was born", "located", "means", "costs"];

/// Deterministic heuristic extraction backend.
#[derive(Debug, Clone, Default)]
pub struct NativeCompletion;

impl NativeCompletion {
    pub fn new() -> Self {
        Self
    }

    /// Split text into sentence-level facts, further splitting "and"
    /// conjunctions when the next clause restarts with a subject.
    fn split_facts(text: &str) -> Vec<String> {
        text.split(['.', '!', '?', ';', '\n'])
            .flat_map(Self::split_conjunction)
            .map(|fact| fact.trim().to_string())
            .filter(|fact| fact.len() > 2)
            .collect()
    }

    fn split_conjunction(sentence: &str) -> Vec<String> {
        let lower = sentence.to_lowercase();
        // Lowercasing can change byte offsets for some scripts; only
        // clause-split when offsets still line up.
        if lower.len() != sentence.len() {
            return vec![sentence.to_string()];
        }
        let mut clauses = Vec::new();
        let mut start = 0;

        for (idx, _) in lower.match_indices(" and ") {
            let rest = &lower[idx + 5..];
            let next_word = rest.split_whitespace().next().unwrap_or("");
            if CLAUSE_SUBJECTS.contains(&next_word) {
                clauses.push(sentence[start..idx].to_string());
                start = idx + 5;
            }
        }
        clauses.push(sentence[start..].to_string());
        clauses
    }

    fn classify(text: &str) -> Strand {
        let lower = text.to_lowercase();
        let count = |markers: &[&str]| markers.iter().filter(|m| lower.contains(*m)).count();

        let votes = [
            (Strand::Preferential, count(PREFERENTIAL_MARKERS)),
            (Strand::Relational, count(RELATIONAL_MARKERS)),
            (Strand::Procedural, count(PROCEDURAL_MARKERS)),
            (Strand::Experiential, count(EXPERIENTIAL_MARKERS)),
            (Strand::Factual, count(FACTUAL_MARKERS)),
        ];

        votes
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .max_by_key(|(_, n)| *n)
            .map(|(strand, _)| strand)
            .unwrap_or(Strand::General)
    }
}

#[async_trait]
impl CompletionProvider for NativeCompletion {
    async fn complete_json(&self, _system: &str, user: &str) -> Result<serde_json::Value> {
        let facts = Self::split_facts(user);
        let strand = Self::classify(user);

        Ok(json!({
            "facts": facts,
            "strand": strand.as_str(),
            "temporalFacts": [],
        }))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}
