use crate::app::ListEntry;

use super::frame::{Line, Span, Tone};
use super::shared::{fit, visible_window};

const LABEL_WIDTH: usize = 40;

fn entry_line(entry: &ListEntry, selected: bool) -> Line {
    let mut line = Line::new(vec![
        Span::plain(if selected { "> " } else { "  " }),
        Span::plain(fit(&entry.label, LABEL_WIDTH)),
    ]);
    if let Some(count) = entry.count {
        let noun = if count == 1 { "app" } else { "apps" };
        line.push(Span::new(format!("  {} {}", count, noun), Tone::Muted));
    }
    if let Some(health) = entry.health {
        line.push(Span::new(format!("  {:<12}", health.as_str()), Tone::for_health(health)));
    }
    if let Some(sync) = entry.sync {
        line.push(Span::new(format!("{:<10}", sync.as_str()), Tone::for_sync(sync)));
    }
    line.highlight(selected)
}

/// Rows of a list view, scrolled to keep `selected` within `height` rows.
pub fn list_lines(entries: &[ListEntry], selected: usize, height: usize, empty_hint: &str) -> Vec<Line> {
    if entries.is_empty() {
        return vec![Line::new(vec![Span::new(format!("  {}", empty_hint), Tone::Muted)])];
    }
    let (start, end) = visible_window(selected, entries.len(), height);
    entries[start..end]
        .iter()
        .enumerate()
        .map(|(i, e)| entry_line(e, start + i == selected))
        .collect()
}
