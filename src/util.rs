// src/util.rs - Shared utility functions

/// Truncate a string for display/logging (UTF-8 safe).
///
/// Returns a substring of at most `max_len` bytes, ensuring the cut
/// point falls on a valid UTF-8 character boundary.
pub fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

/// First line of `s`, cut to `max_len` bytes with an ellipsis when shortened.
pub fn preview(s: &str, max_len: usize) -> String {
    let line = s.lines().next().unwrap_or("").trim();
    let cut = truncate_str(line, max_len);
    if cut.len() < line.len() || s.trim().lines().count() > 1 {
        format!("{}...", cut)
    } else {
        cut.to_string()
    }
}
