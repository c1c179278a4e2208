//! Text tokenizer for the inverted index and embedding vectors
//!
//! Pipeline: lowercase → split on non-alphanumeric runs → drop empties

use std::collections::HashSet;

/// Tokenize text into index terms.
///
/// A token is a maximal run of alphanumeric characters of the lowercased
/// input; every other character is a separator.
///
/// # Example
///
/// ```
/// use capstan_engine::search::tokenizer::tokenize;
///
/// let tokens = tokenize("Hello, World! v2");
/// assert_eq!(tokens, vec!["hello", "world", "v2"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokenize and deduplicate, preserving first-seen order.
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Token set of a text, for containment checks.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}
