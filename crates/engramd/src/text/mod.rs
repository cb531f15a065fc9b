//! Text analysis: tokenization and lexical scoring.
//!
//! The tokenizer feeds both the BM25 rescoring step of retrieval and the
//! chronicle matcher, so the two always agree on what counts as a term.

pub mod bm25;

/// English stopwords dropped during tokenization.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an",
    "and", "any", "are", "as", "at", "be", "because", "been", "before",
    "being", "below", "between", "both", "but", "by", "can", "could", "did",
    "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our",
    "ours", "out", "over", "own", "same", "she", "should", "so", "some",
    "such", "than", "that", "the", "their", "theirs", "them", "then",
    "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "you",
    "your", "yours",
];

/// Tokenize text for lexical matching.
///
/// Lowercases, replaces any non-alphanumeric character with a space,
/// splits on whitespace, then drops stopwords and single-character
/// tokens. Token order is preserved.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|token| token.len() > 1 && !STOPWORDS.contains(token))
        .map(|token| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        let tokens = tokenize("Hello, World! It's GREAT.");
        assert_eq!(tokens, vec!["hello", "world", "great"]);
    }

    #[test]
    fn drops_stopwords_and_short_tokens() {
        let tokens = tokenize("I am a big fan of the x factor");
        assert_eq!(tokens, vec!["big", "fan", "factor"]);
    }

    #[test]
    fn preserves_order() {
        let tokens = tokenize("zebra apple zebra mango");
        assert_eq!(tokens, vec!["zebra", "apple", "zebra", "mango"]);
    }

    #[test]
    fn empty_and_punctuation_only_inputs() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("?!.,;--").is_empty());
    }

    #[test]
    fn keeps_digits() {
        let tokens = tokenize("port 8080 open");
        assert_eq!(tokens, vec!["port", "8080", "open"]);
    }
}
