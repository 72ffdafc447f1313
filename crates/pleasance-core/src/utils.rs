//! Utility helpers — data paths and string shortening for log/console output.

use std::path::PathBuf;

/// Get the Pleasance data directory (e.g. `~/.pleasance/`).
pub fn get_data_path() -> PathBuf {
    let home = dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".pleasance")
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
/// Unicode-safe.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Single-line preview of generated content (newlines flattened).
pub fn preview(s: &str, max_len: usize) -> String {
    truncate_string(&s.replace(['\r', '\n'], " "), max_len)
}

/// First `n` characters of an identifier, for compact console output.
pub fn short_id(id: &str, n: usize) -> &str {
    match id.char_indices().nth(n) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        let result = truncate_string("hello world, this is a long string", 15);
        assert_eq!(result, "hello world,...");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate_string("こんにちは世界です", 5), "こん...");
    }

    #[test]
    fn test_preview_flattens_newlines() {
        assert_eq!(preview("a\nb\r\nc", 20), "a b  c");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef", 8), "01234567");
        assert_eq!(short_id("abc", 8), "abc");
    }

    #[test]
    fn test_data_path_ends_with_pleasance() {
        assert!(get_data_path().ends_with(".pleasance"));
    }
}
