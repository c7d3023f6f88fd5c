/// Find the largest byte index <= `index` that is a valid UTF-8 char boundary.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Truncate `s` to at most `max_bytes`, respecting UTF-8 boundaries, and
/// append a marker noting how much was dropped. Used for the Executor's
/// `ERR_CAP` (non-JSON response bodies, error summaries).
pub fn truncate_with_marker(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let marker_budget = max_bytes.saturating_sub(40);
    let cut = floor_char_boundary(s, marker_budget);
    format!("{}...[truncated {} of {} bytes]", &s[..cut], cut, s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_string_untouched() {
        assert_eq!(truncate_with_marker("hi", 100), "hi");
    }

    #[test]
    fn long_string_truncated_with_marker() {
        let long = "a".repeat(3000);
        let result = truncate_with_marker(&long, 2048);
        assert!(result.len() <= 2048 + 40);
        assert!(result.contains("truncated"));
    }

    #[test]
    fn respects_utf8_boundary() {
        let mut s = "a".repeat(9);
        s.push('€');
        s.push_str(&"b".repeat(20));
        let result = truncate_with_marker(&s, 10);
        assert!(std::str::from_utf8(result.as_bytes()).is_ok());
    }
}
