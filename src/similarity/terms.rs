//! Technical-term extraction for the lexical signal.

use std::collections::BTreeSet;

const MIN_TERM_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "onto", "that", "this", "these", "those",
    "are", "was", "were", "been", "being", "have", "has", "had", "will", "shall", "would",
    "should", "can", "could", "may", "might", "must", "our", "your", "their", "its", "all",
    "any", "each", "every", "other", "such", "who", "whom", "which", "what", "when", "where",
    "while", "within", "across", "over", "under", "about", "via", "per", "not", "but", "also",
    "ensure", "ensures", "ensuring", "including", "include", "includes", "using", "use",
    "able", "ability", "responsible", "responsibility", "work", "works", "working", "new",
    "own", "owns", "etc",
];

/// Lowercased content tokens (stop words and short tokens removed) plus
/// bigrams of adjacent content tokens.
#[must_use]
pub fn technical_terms(text: &str) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|token| token.chars().count() >= MIN_TERM_LEN && !STOPWORDS.contains(token))
        .collect();

    let mut terms: BTreeSet<String> = tokens.iter().map(|t| (*t).to_string()).collect();
    for window in tokens.windows(2) {
        terms.insert(format!("{} {}", window[0], window[1]));
    }
    terms
}

/// `|A ∩ B| / min(|A|, |B|)`, 0 when either set is empty.
#[must_use]
pub fn overlap_coefficient(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = shared as f32 / smaller as f32;
    ratio
}
