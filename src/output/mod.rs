// Output formatting — terminal display and scatter exports.

pub mod scatter;
pub mod terminal;

/// At most `max_chars` characters of `text`, with "..." when cut.
/// Counts chars, not bytes, so review text in any script is safe.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("café au lait", 4), "café...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
