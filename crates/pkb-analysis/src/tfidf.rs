//! Per-language frequency-based keyword extraction, the last-resort tier
//! (spec §4.8, tier 3). Operates on a single document, so "tf-idf" here is
//! really normalised term frequency — there is no corpus to derive an
//! inverse-document-frequency term from.

use std::collections::HashMap;

use pkb_core::types::Language;

const MIN_NORMALISED_FREQUENCY: f64 = 0.01;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
    "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
    "these", "they", "this", "to", "was", "will", "with",
];

fn english_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn cjk_tokens(text: &str) -> Vec<String> {
    let codepoints: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let mut tokens: Vec<String> = codepoints.iter().map(|c| c.to_string()).collect();
    for window in codepoints.windows(2) {
        tokens.push(window.iter().collect());
    }
    tokens
}

/// Keeps terms whose normalised frequency (count / total tokens) is at
/// least `MIN_NORMALISED_FREQUENCY`, ranked by frequency, capped at
/// `num_keywords`.
pub fn extract_keywords(text: &str, language: Language, num_keywords: usize) -> Vec<String> {
    let tokens = match language {
        Language::En => english_tokens(text),
        Language::Cjk => cjk_tokens(text),
    };
    if tokens.is_empty() {
        return Vec::new();
    }

    let total = tokens.len() as f64;
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for token in tokens {
        if !counts.contains_key(&token) {
            order.push(token.clone());
        }
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut kept: Vec<(String, f64)> = order
        .into_iter()
        .filter_map(|term| {
            let freq = counts[&term] as f64 / total;
            (freq >= MIN_NORMALISED_FREQUENCY).then_some((term, freq))
        })
        .collect();

    kept.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    kept.into_iter().take(num_keywords).map(|(t, _)| t).collect()
}
