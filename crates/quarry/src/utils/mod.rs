//! crates/quarry/src/utils/mod.rs
//! Shared utility functions used across the codebase

/// Truncate a string to at most `max_chars` characters (no ellipsis).
///
/// Counts characters rather than bytes so multi-byte text never splits
/// inside a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Round to a fixed number of decimal places.
///
/// Values too large to scale are returned as-is; they have no fractional
/// part at that magnitude anyway.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// Remove duplicates while keeping first-seen order.
pub fn dedup_preserving_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Parse a boolean flag as written in env vars or config ("1", "yes", "off", ...).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
