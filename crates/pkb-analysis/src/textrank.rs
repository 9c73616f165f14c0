//! Graph-based co-occurrence keyword ranking (spec §4.8, tier 2).

use std::collections::HashMap;

use unicode_segmentation::UnicodeSegmentation;

const WINDOW: usize = 5;
const DAMPING: f64 = 0.85;
const CONVERGENCE: f64 = 1e-4;
const MAX_ITERATIONS: usize = 100;

fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .collect()
}

/// Ranks the distinct tokens in `text` by TextRank score and returns the top
/// `num_keywords`. Ties are broken by order of first appearance in the text.
/// Returns an empty vec if `text` has fewer than two distinct tokens — there
/// is no graph to rank.
pub fn extract_keywords(text: &str, num_keywords: usize) -> Vec<String> {
    let tokens = tokenize(text);

    let mut node_index: HashMap<String, usize> = HashMap::new();
    let mut nodes: Vec<String> = Vec::new();
    for token in &tokens {
        if !node_index.contains_key(token) {
            node_index.insert(token.clone(), nodes.len());
            nodes.push(token.clone());
        }
    }
    let n = nodes.len();
    if n < 2 {
        return Vec::new();
    }

    let mut edges: Vec<HashMap<usize, f64>> = vec![HashMap::new(); n];
    for i in 0..tokens.len() {
        let a = node_index[&tokens[i]];
        for j in (i + 1)..tokens.len().min(i + WINDOW) {
            let b = node_index[&tokens[j]];
            if a == b {
                continue;
            }
            *edges[a].entry(b).or_insert(0.0) += 1.0;
            *edges[b].entry(a).or_insert(0.0) += 1.0;
        }
    }

    let out_degree: Vec<f64> = edges.iter().map(|m| m.values().sum()).collect();
    let mut scores = vec![1.0_f64; n];

    for _ in 0..MAX_ITERATIONS {
        let mut next = vec![1.0 - DAMPING; n];
        for i in 0..n {
            for (&j, &weight) in &edges[i] {
                if out_degree[j] > 0.0 {
                    next[i] += DAMPING * (weight / out_degree[j]) * scores[j];
                }
            }
        }
        let delta: f64 = next
            .iter()
            .zip(scores.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        scores = next;
        if delta < CONVERGENCE {
            break;
        }
    }

    let mut ranked: Vec<usize> = (0..n).collect();
    ranked.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap()
            .then(a.cmp(&b)) // tie-break: insertion order
    });

    ranked
        .into_iter()
        .take(num_keywords)
        .map(|i| nodes[i].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_distinct_token_yields_nothing() {
        assert!(extract_keywords("rust rust rust", 5).is_empty());
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(extract_keywords("", 5).is_empty());
    }

    #[test]
    fn ranks_co_occurring_terms_above_isolated_ones() {
        let text = "rust programming rust programming systems rust programming \
                    networking once";
        let keywords = extract_keywords(text, 2);
        assert_eq!(keywords.len(), 2);
        assert!(keywords.contains(&"rust".to_string()));
        assert!(keywords.contains(&"programming".to_string()));
    }

    #[test]
    fn respects_requested_keyword_count() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let keywords = extract_keywords(text, 3);
        assert_eq!(keywords.len(), 3);
    }
}
