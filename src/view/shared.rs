/// Truncate a string to at most `max_len` characters (not bytes), appending "..."
/// if truncated. Safe for multi-byte UTF-8.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else {
        let keep = max_len.saturating_sub(3);
        let truncated: String = s.chars().take(keep).collect();
        format!("{}...", truncated)
    }
}

/// Pad with spaces to `width` characters, truncating longer strings.
pub fn fit(s: &str, width: usize) -> String {
    let t = truncate_str(s, width);
    let pad = width.saturating_sub(t.chars().count());
    format!("{}{}", t, " ".repeat(pad))
}

/// First and one-past-last row of a `height`-row window over `len` rows that
/// keeps `selected` visible, scrolling as little as possible.
pub fn visible_window(selected: usize, len: usize, height: usize) -> (usize, usize) {
    if height == 0 || len == 0 {
        return (0, 0);
    }
    if len <= height {
        return (0, len);
    }
    let selected = selected.min(len - 1);
    let start = selected.saturating_sub(height - 1).min(len - height);
    // centre the selection unless that runs past the end
    let start = start.max(selected.saturating_sub(height / 2)).min(len - height);
    (start, start + height)
}
