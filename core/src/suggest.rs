//! Vocabulary suggestions: completions for wildcard terms and corrections for
//! terms that matched little or nothing.

use crate::index::SubstringIndex;
use crate::tokenizer::normalize;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Corrections scoring below this similarity are dropped.
const MIN_SIMILARITY: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub term: String,
    /// Similarity in `0.0..=1.0`; higher is better.
    pub score: f64,
}

pub trait Suggester {
    /// Indexed words starting with `prefix`, most frequent first.
    fn complete(&self, prefix: &str, limit: usize) -> Vec<Suggestion>;
    /// Indexed words close to `term`, most similar first.
    fn correct(&self, term: &str, limit: usize) -> Vec<Suggestion>;
}

/// Suggestions ranked against the words of a built index.
pub struct VocabularySuggester<'a> {
    index: &'a SubstringIndex,
}

impl<'a> VocabularySuggester<'a> {
    pub fn new(index: &'a SubstringIndex) -> Self {
        Self { index }
    }
}

fn by_score(a: &(Suggestion, u32), b: &(Suggestion, u32)) -> Ordering {
    b.0.score
        .partial_cmp(&a.0.score)
        .unwrap_or(Ordering::Equal)
        .then(b.1.cmp(&a.1))
        .then_with(|| a.0.term.cmp(&b.0.term))
}

impl Suggester for VocabularySuggester<'_> {
    fn complete(&self, prefix: &str, limit: usize) -> Vec<Suggestion> {
        if normalize(prefix).is_empty() {
            return Vec::new();
        }
        let mut found: Vec<(String, u32)> = self
            .index
            .walk_prefix(prefix)
            .filter_map(|entry| entry.term)
            .map(|term| (term.text.clone(), term.occurrences))
            .collect();
        let total: u32 = found.iter().map(|(_, n)| n).sum();
        found.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        found
            .into_iter()
            .take(limit)
            .map(|(term, n)| Suggestion { term, score: n as f64 / total.max(1) as f64 })
            .collect()
    }

    fn correct(&self, term: &str, limit: usize) -> Vec<Suggestion> {
        let target = normalize(term);
        let target_len = target.chars().count();
        if target_len == 0 {
            return Vec::new();
        }
        let mut ranked: Vec<(Suggestion, u32)> = Vec::new();
        for candidate in self.index.terms() {
            let len = target_len.max(candidate.text.chars().count());
            let budget = (len as f64 * (1.0 - MIN_SIMILARITY)).floor() as usize;
            if let Some(distance) = bounded_levenshtein(&target, &candidate.text, budget) {
                let score = 1.0 - distance as f64 / len as f64;
                ranked.push((Suggestion { term: candidate.text.clone(), score }, candidate.occurrences));
            }
        }
        ranked.sort_by(by_score);
        ranked.into_iter().take(limit).map(|(s, _)| s).collect()
    }
}

/// Edit distance between `a` and `b`, or `None` once it must exceed `max`.
pub fn bounded_levenshtein(a: &str, b: &str, max: usize) -> Option<usize> {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    // Length difference is a lower bound on the distance.
    if a_len.abs_diff(b_len) > max {
        return None;
    }

    let mut row: Vec<usize> = (0..=b_len).collect();
    for (i, ac) in a.chars().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        let mut row_min = row[0];
        for (j, bc) in b.chars().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ac != bc);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diag + cost);
            diag = above;
            row_min = row_min.min(row[j + 1]);
        }
        if row_min > max {
            return None;
        }
    }
    Some(row[b_len]).filter(|&d| d <= max)
}
