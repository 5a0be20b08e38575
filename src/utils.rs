/// Longest prefix of `text` holding at most `max_chars` characters
///
/// Returns the prefix and whether anything was cut. Never splits a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}

/// Resolve an optional caller-supplied count into `1..=max`
///
/// Missing values take `default`. Out-of-range values are clamped, never rejected.
pub fn clamp_count(value: Option<i64>, default: usize, max: usize) -> usize {
    let max = max.max(1);
    match value {
        None => default.clamp(1, max),
        Some(v) if v < 1 => 1,
        Some(v) => usize::try_from(v).map_or(max, |v| v.min(max)),
    }
}
