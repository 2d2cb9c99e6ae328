//! Fuzzy question matching.
//!
//! Dice coefficient over character bigrams, linear scan over the candidate
//! list. O(n) per query with no indexing - acceptable at the scale of one
//! session's question history, and deliberately not a search engine.

use serde::Serialize;
use std::collections::HashMap;

/// Default similarity threshold for the search endpoint.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// A candidate that met the threshold.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMatch {
    /// Index into the candidate slice passed to [`find_matches`].
    pub index: usize,
    /// Dice similarity in `[0, 1]`.
    pub score: f64,
}

/// Lowercases and collapses all whitespace runs to single spaces.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn bigrams(text: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Dice coefficient between the bigram multisets of two normalized strings.
///
/// Strings shorter than two characters carry no bigrams; they score 1.0 on
/// exact (normalized) equality and 0.0 otherwise.
pub fn dice_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    if a == b {
        return 1.0;
    }
    if a.chars().count() < 2 || b.chars().count() < 2 {
        return 0.0;
    }

    let a_bigrams = bigrams(&a);
    let b_bigrams = bigrams(&b);

    let mut counts: HashMap<(char, char), usize> = HashMap::new();
    for bg in &a_bigrams {
        *counts.entry(*bg).or_insert(0) += 1;
    }

    let mut intersection = 0usize;
    for bg in &b_bigrams {
        if let Some(count) = counts.get_mut(bg) {
            if *count > 0 {
                *count -= 1;
                intersection += 1;
            }
        }
    }

    (2.0 * intersection as f64) / (a_bigrams.len() + b_bigrams.len()) as f64
}

/// Scores every candidate against the query and returns those at or above
/// `threshold`, sorted descending by score (stable by index on ties).
pub fn find_matches(query: &str, candidates: &[String], threshold: f64) -> Vec<ScoredMatch> {
    let mut matches: Vec<ScoredMatch> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| ScoredMatch {
            index,
            score: dice_similarity(query, candidate),
        })
        .filter(|m| m.score >= threshold)
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings_score_one() {
        assert_eq!(dice_similarity("newton's laws", "newton's laws"), 1.0);
        // Normalization: case and whitespace do not matter.
        assert_eq!(dice_similarity("Newton's  Laws", "newton's laws"), 1.0);
    }

    #[test]
    fn test_disjoint_strings_score_zero() {
        assert_eq!(dice_similarity("abcd", "wxyz"), 0.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(dice_similarity("a", "a"), 1.0);
        assert_eq!(dice_similarity("a", "b"), 0.0);
        assert_eq!(dice_similarity("", "abcd"), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        let score = dice_similarity("explain newton's laws", "state newton's laws");
        assert!(score > 0.5, "expected strong overlap, got {}", score);
        assert!(score < 1.0);
    }

    #[test]
    fn test_find_matches_empty_below_threshold() {
        let candidates = vec!["photosynthesis".to_string(), "mitosis".to_string()];
        let matches = find_matches("quadratic equations", &candidates, DEFAULT_THRESHOLD);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_find_matches_ordered_by_descending_score() {
        let candidates = vec![
            "balance this redox reaction".to_string(),
            "explain newton's first law".to_string(),
            "explain newton's laws of motion".to_string(),
        ];
        let matches = find_matches("explain newton's laws", &candidates, DEFAULT_THRESHOLD);

        assert!(matches.len() >= 2);
        assert_eq!(matches[0].index, 2);
        assert_eq!(matches[1].index, 1);
        for pair in matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let candidates = vec!["ab".to_string()];
        // Identical: score 1.0, threshold 1.0 still matches.
        let matches = find_matches("ab", &candidates, 1.0);
        assert_eq!(matches.len(), 1);
    }
}
