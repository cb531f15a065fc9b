//! Okapi BM25 over an in-memory candidate set.
//!
//! Retrieval applies BM25 only to the vector-retrieved shortlist (or the
//! recency-ordered fallback window), so document frequency and length
//! normalization are computed across that candidate set, not a corpus
//! index.

use std::collections::HashMap;

use crate::text::tokenize;

/// Okapi BM25 parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Score a query against a candidate document set.
///
/// Returns one score per document, aligned with the input order. An empty
/// query or empty candidate set yields all-zero scores.
pub fn score_documents(query: &str, documents: &[&str], params: Bm25Params) -> Vec<f32> {
    let query_tokens = tokenize(query);
    if documents.is_empty() {
        return Vec::new();
    }
    if query_tokens.is_empty() {
        return vec![0.0; documents.len()];
    }

    let doc_tokens: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();
    score_tokenized(&query_tokens, &doc_tokens, params)
}

/// BM25 over pre-tokenized documents. Exposed so callers that already
/// tokenized (the retrieval pipeline tokenizes once per candidate) avoid
/// a second pass.
pub fn score_tokenized(
    query_tokens: &[String],
    doc_tokens: &[Vec<String>],
    params: Bm25Params,
) -> Vec<f32> {
    let n = doc_tokens.len();
    if n == 0 {
        return Vec::new();
    }
    if query_tokens.is_empty() {
        return vec![0.0; n];
    }

    // Term frequencies per document.
    let term_freqs: Vec<HashMap<&str, usize>> = doc_tokens
        .iter()
        .map(|tokens| {
            let mut freqs = HashMap::new();
            for token in tokens {
                *freqs.entry(token.as_str()).or_insert(0) += 1;
            }
            freqs
        })
        .collect();

    let total_len: usize = doc_tokens.iter().map(|t| t.len()).sum();
    let avg_len = if total_len == 0 {
        1.0
    } else {
        total_len as f32 / n as f32
    };

    // Document frequency per distinct query term, across the candidate set.
    let mut distinct_terms: Vec<&str> = query_tokens.iter().map(|t| t.as_str()).collect();
    distinct_terms.sort_unstable();
    distinct_terms.dedup();

    let idf: HashMap<&str, f32> = distinct_terms
        .iter()
        .map(|term| {
            let df = term_freqs.iter().filter(|f| f.contains_key(*term)).count() as f32;
            let idf = ((n as f32 - df + 0.5) / (df + 0.5) + 1.0).ln();
            (*term, idf)
        })
        .collect();

    doc_tokens
        .iter()
        .enumerate()
        .map(|(i, tokens)| {
            let len_norm = 1.0 - params.b + params.b * (tokens.len() as f32 / avg_len);
            distinct_terms
                .iter()
                .map(|term| {
                    let tf = *term_freqs[i].get(*term).unwrap_or(&0) as f32;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    idf[*term] * (tf * (params.k1 + 1.0)) / (tf + params.k1 * len_norm)
                })
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(query: &str, docs: &[&str]) -> Vec<f32> {
        score_documents(query, docs, Bm25Params::default())
    }

    #[test]
    fn matching_document_scores_higher() {
        let scores = score(
            "quantum computing",
            &[
                "quantum computing operates at low temperatures",
                "rust is a systems programming language",
            ],
        );
        assert!(scores[0] > 0.0);
        assert_eq!(scores[1], 0.0);
    }

    #[test]
    fn rarer_terms_weigh_more() {
        // "database" appears in every doc, "sharding" in one; the doc with
        // the rare term should win even with equal match counts.
        let scores = score(
            "database sharding",
            &[
                "database sharding strategy",
                "database replication notes",
                "database backup schedule",
            ],
        );
        assert!(scores[0] > scores[1]);
        assert!(scores[0] > scores[2]);
    }

    #[test]
    fn empty_query_is_all_zeros() {
        let scores = score("", &["anything at all", "something else"]);
        assert_eq!(scores, vec![0.0, 0.0]);
    }

    #[test]
    fn empty_candidate_set_is_empty() {
        assert!(score("query terms", &[]).is_empty());
    }

    #[test]
    fn repeated_terms_saturate() {
        // Term frequency saturation: doubling occurrences must not double
        // the score.
        let scores = score(
            "coffee",
            &["coffee coffee coffee coffee notes", "coffee notes brewing"],
        );
        assert!(scores[0] > scores[1]);
        assert!(scores[0] < scores[1] * 2.0);
    }

    #[test]
    fn length_normalization_penalizes_long_documents() {
        let scores = score(
            "hiking",
            &[
                "hiking",
                "hiking plus many extra words diluting relevance across padded document content here",
            ],
        );
        assert!(scores[0] > scores[1]);
    }
}
