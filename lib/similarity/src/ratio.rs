//! Edit-distance ratios for free-text matching
//!
//! All ratios are percentages in `[0.0, 100.0]` where 100 means identical.
//! [`weighted_ratio`] normalizes both inputs first and combines the other
//! ratios into one rounded score.

use std::collections::BTreeSet;
use strsim::levenshtein;

/// Token-based ratios never count as an exact match
const UNBASE_SCALE: f64 = 0.95;
/// Length ratio at which substring alignment takes over
const PARTIAL_THRESHOLD: f64 = 1.5;
/// Length ratio beyond which substring alignment is trusted much less
const LONG_PARTIAL_THRESHOLD: f64 = 8.0;

/// Lower-case, replace every non-alphanumeric character with a space, trim
pub fn process(text: &str) -> String {
    let mapped: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.trim().to_string()
}

/// Normalized Levenshtein similarity
pub fn ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 100.0;
    }
    let distance = levenshtein(a, b);
    (1.0 - distance as f64 / longest as f64) * 100.0
}

/// Best [`ratio`] of the shorter string against every same-length window
/// of the longer one
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_len = short.chars().count();
    if short_len == 0 {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }

    let long_chars: Vec<char> = long.chars().collect();
    if short_len == long_chars.len() {
        return ratio(short, long);
    }

    let mut best = 0.0f64;
    for window in long_chars.windows(short_len) {
        let candidate: String = window.iter().collect();
        best = best.max(ratio(short, &candidate));
        if best >= 100.0 {
            break;
        }
    }
    best
}

/// [`ratio`] after sorting the whitespace tokens of both strings
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Compares the shared tokens against each side's full token set, so extra
/// words on one side cost little
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let shared: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !shared.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let shared = shared.join(" ");
    let combined_a = join_nonempty(&shared, &only_a.join(" "));
    let combined_b = join_nonempty(&shared, &only_b.join(" "));

    let mut best = ratio(&combined_a, &combined_b);
    if !shared.is_empty() {
        best = best
            .max(ratio(&shared, &combined_a))
            .max(ratio(&shared, &combined_b));
    }
    best
}

/// Weighted combination of the ratios above, on normalized inputs.
///
/// Strings of similar length are scored by plain and token ratios. When one
/// string is at least 1.5 times longer, substring alignment is used instead,
/// scaled down as the length gap grows. Empty input scores 0.
pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    weighted_ratio_processed(&process(a), &process(b))
}

/// [`weighted_ratio`] for inputs that already went through [`process`]
pub(crate) fn weighted_ratio_processed(a: &str, b: &str) -> u8 {
    let (len_a, len_b) = (a.chars().count(), b.chars().count());
    if len_a == 0 || len_b == 0 {
        return 0;
    }

    let len_ratio = len_a.max(len_b) as f64 / len_a.min(len_b) as f64;
    let mut score = ratio(a, b);

    if len_ratio < PARTIAL_THRESHOLD {
        let token = token_sort_ratio(a, b).max(token_set_ratio(a, b));
        score = score.max(token * UNBASE_SCALE);
    } else {
        let partial_scale = if len_ratio < LONG_PARTIAL_THRESHOLD {
            0.9
        } else {
            0.6
        };
        score = score.max(partial_ratio(a, b) * partial_scale);
        score = score.max(partial_token_ratio(a, b) * UNBASE_SCALE * partial_scale);
    }

    score.round().clamp(0.0, 100.0) as u8
}

fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if !tokens_a.is_disjoint(&tokens_b) {
        return 100.0;
    }
    partial_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join_nonempty(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{} {}", head, tail),
    }
}
