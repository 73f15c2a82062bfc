/// A cell on the rendered screen. Ordering compares row first, then column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Click-drag text selection over a plain-text screen buffer.
///
/// `start` and `end` are kept in drag order; reading order is computed by
/// [`Selection::normalize`] whenever it is needed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub start: Position,
    pub end: Position,
    pub active: bool,
    pub has_content: bool,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the empty state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Begin a drag at `pos`, dropping any finalized content.
    pub fn set_start(&mut self, pos: Position) {
        self.start = pos;
        self.end = pos;
        self.active = true;
        self.has_content = false;
    }

    /// Move the live end point. Ignored when no drag is in progress.
    pub fn set_end(&mut self, pos: Position) {
        if self.active {
            self.end = pos;
        }
    }

    /// End the drag. Returns whether the selection covers anything.
    pub fn finalize(&mut self) -> bool {
        self.active = false;
        self.has_content = self.start != self.end;
        self.has_content
    }

    pub fn is_empty(&self) -> bool {
        !self.active && !self.has_content
    }

    /// (start, end) in top-left to bottom-right order.
    pub fn normalize(&self) -> (Position, Position) {
        if self.end < self.start {
            (self.end, self.start)
        } else {
            (self.start, self.end)
        }
    }

    /// Whether the cell at (`row`, `col`) lies inside the selection, bounds inclusive.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        if self.is_empty() {
            return false;
        }
        let (start, end) = self.normalize();
        let pos = Position::new(row, col);
        pos >= start && pos <= end
    }

    /// Column range `[from, to)` covered on `row`, for highlighting. `None` when
    /// the row is outside the selection.
    pub fn columns_on_row(&self, row: usize, line_width: usize) -> Option<(usize, usize)> {
        if self.is_empty() {
            return None;
        }
        let (start, end) = self.normalize();
        if row < start.row || row > end.row {
            return None;
        }
        let from = if row == start.row { start.col } else { 0 };
        let to = if row == end.row { end.col } else { line_width };
        let from = from.min(line_width);
        let to = to.min(line_width);
        (from < to).then_some((from, to))
    }

    /// Text covered by the selection. Columns are counted in chars and clamped
    /// to each line's length; rows past the buffer are ignored.
    pub fn extract_text(&self, lines: &[String]) -> String {
        if self.is_empty() || lines.is_empty() {
            return String::new();
        }
        let (start, end) = self.normalize();
        if start.row >= lines.len() {
            return String::new();
        }
        let end_row = end.row.min(lines.len() - 1);

        let mut out = String::new();
        for (row, line) in lines.iter().enumerate().take(end_row + 1).skip(start.row) {
            let chars: Vec<char> = line.chars().collect();
            let from = if row == start.row { start.col.min(chars.len()) } else { 0 };
            let to = if row == end.row { end.col.min(chars.len()) } else { chars.len() };
            if from < to {
                out.extend(&chars[from..to]);
            }
            if row < end_row {
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn selected(start: (usize, usize), end: (usize, usize)) -> Selection {
        let mut sel = Selection::new();
        sel.set_start(Position::new(start.0, start.1));
        sel.set_end(Position::new(end.0, end.1));
        sel.finalize();
        sel
    }

    #[test]
    fn new_selection_is_empty() {
        let sel = Selection::new();
        assert!(sel.is_empty());
        assert!(!sel.contains(0, 0));
        assert_eq!(sel.extract_text(&lines(&["abc"])), "");
    }

    #[test]
    fn set_start_clears_finalized_content() {
        let mut sel = selected((0, 0), (0, 3));
        assert!(sel.has_content);
        sel.set_start(Position::new(1, 1));
        assert!(sel.active);
        assert!(!sel.has_content);
        assert_eq!(sel.end, Position::new(1, 1));
    }

    #[test]
    fn plain_click_is_not_content() {
        let mut sel = Selection::new();
        sel.set_start(Position::new(2, 4));
        assert!(!sel.finalize());
        assert!(sel.is_empty());
    }

    #[test]
    fn set_end_without_drag_is_ignored() {
        let mut sel = Selection::new();
        sel.set_end(Position::new(3, 3));
        assert_eq!(sel.end, Position::default());
    }

    #[test]
    fn normalize_orders_backwards_drag() {
        let sel = selected((2, 1), (0, 5));
        assert_eq!(sel.normalize(), (Position::new(0, 5), Position::new(2, 1)));
        // Same row, right to left.
        let sel = selected((1, 9), (1, 2));
        assert_eq!(sel.normalize(), (Position::new(1, 2), Position::new(1, 9)));
    }

    #[test]
    fn contains_uses_normalized_inclusive_bounds() {
        let sel = selected((2, 3), (0, 5));
        assert!(sel.contains(0, 5));
        assert!(!sel.contains(0, 4));
        assert!(sel.contains(1, 0));
        assert!(sel.contains(2, 3));
        assert!(!sel.contains(2, 4));
        assert!(!sel.contains(3, 0));
    }

    #[test]
    fn extract_single_line() {
        let sel = selected((0, 7), (0, 12));
        assert_eq!(sel.extract_text(&lines(&["Hello, World!"])), "World");
    }

    #[test]
    fn extract_multi_line() {
        let sel = selected((0, 5), (2, 4));
        let buf = lines(&["Line 1", "Line 2", "Line 3"]);
        assert_eq!(sel.extract_text(&buf), "1\nLine 2\nLine");
    }

    #[test]
    fn extract_backwards_drag_matches_forward() {
        let forward = selected((0, 5), (2, 4));
        let backward = selected((2, 4), (0, 5));
        let buf = lines(&["Line 1", "Line 2", "Line 3"]);
        assert_eq!(forward.extract_text(&buf), backward.extract_text(&buf));
    }

    #[test]
    fn extract_start_equals_end_is_empty() {
        let sel = selected((0, 3), (0, 3));
        assert_eq!(sel.extract_text(&lines(&["Hello"])), "");
    }

    #[test]
    fn extract_clamps_to_rune_length() {
        // Columns count chars, not bytes.
        let sel = selected((0, 1), (0, 40));
        assert_eq!(sel.extract_text(&lines(&["├── Pod ✓"])), "── Pod ✓");
    }

    #[test]
    fn extract_clamps_rows_past_buffer() {
        let sel = selected((1, 0), (9, 2));
        assert_eq!(sel.extract_text(&lines(&["a", "bb", "cc"])), "bb\ncc");
        let sel = selected((5, 0), (6, 2));
        assert_eq!(sel.extract_text(&lines(&["a"])), "");
    }

    #[test]
    fn columns_on_row_for_highlighting() {
        let sel = selected((0, 2), (2, 3));
        assert_eq!(sel.columns_on_row(0, 10), Some((2, 10)));
        assert_eq!(sel.columns_on_row(1, 6), Some((0, 6)));
        assert_eq!(sel.columns_on_row(2, 10), Some((0, 3)));
        assert_eq!(sel.columns_on_row(3, 10), None);
    }
}
