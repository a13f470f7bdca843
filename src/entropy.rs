//! Shannon entropy over Unicode code points.
//!
//! Entropy is used both to rank matches and to qualify them against a rule's
//! minimum threshold. Probabilities are taken over code points, not bytes, so
//! UTF-8 multi-byte sequences count each scalar value once.

use std::collections::HashMap;

/// Computes the Shannon entropy `-Σ p(c) · log2 p(c)` of a string.
///
/// Empty input and input with a single distinct code point both yield `0.0`.
pub fn shannon_entropy(s: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    let mut total = 0u32;
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
        total += 1;
    }

    if total == 0 {
        return 0.0;
    }

    let total = f64::from(total);
    let mut entropy = 0.0;
    for count in counts.values() {
        let p = f64::from(*count) / total;
        entropy -= p * p.log2();
    }
    entropy
}
