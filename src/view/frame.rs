use std::io::{self, Write};

use crossterm::{
    cursor, queue,
    style::{Attribute, Color, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal,
};

use crate::model::{HealthStatus, SyncStatus};
use crate::selection::Selection;

/// Semantic colour class of a span. Mapped to terminal colours only at draw time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tone {
    #[default]
    Plain,
    Muted,
    Accent,
    Good,
    Warn,
    Bad,
    Title,
}

impl Tone {
    pub fn for_health(health: HealthStatus) -> Tone {
        match health {
            HealthStatus::Healthy => Tone::Good,
            HealthStatus::Progressing => Tone::Accent,
            HealthStatus::Degraded | HealthStatus::Missing => Tone::Bad,
            HealthStatus::Suspended => Tone::Warn,
            HealthStatus::Unknown => Tone::Muted,
        }
    }

    pub fn for_sync(sync: SyncStatus) -> Tone {
        match sync {
            SyncStatus::Synced => Tone::Good,
            SyncStatus::OutOfSync => Tone::Warn,
            SyncStatus::Unknown => Tone::Muted,
        }
    }

    fn color(&self) -> Option<Color> {
        match self {
            Tone::Plain | Tone::Title => None,
            Tone::Muted => Some(Color::DarkGrey),
            Tone::Accent => Some(Color::Cyan),
            Tone::Good => Some(Color::Green),
            Tone::Warn => Some(Color::Yellow),
            Tone::Bad => Some(Color::Red),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub tone: Tone,
}

impl Span {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self { text: text.into(), tone }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Tone::Plain)
    }
}

/// One screen row made of styled spans.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Line {
    pub spans: Vec<Span>,
    pub highlighted: bool,
}

impl Line {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans, highlighted: false }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(vec![Span::plain(text)])
    }

    pub fn push(&mut self, span: Span) {
        self.spans.push(span);
    }

    pub fn highlight(mut self, on: bool) -> Self {
        self.highlighted = on;
        self
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn width(&self) -> usize {
        self.spans.iter().map(|s| s.text.chars().count()).sum()
    }
}

/// Draw `lines` from the top of the screen, clipped to the terminal size, and
/// overlay the selection. Returns the plain text of every row drawn so a later
/// selection can be extracted from exactly what the user saw.
pub fn draw(out: &mut impl Write, lines: &[Line], selection: &Selection) -> io::Result<Vec<String>> {
    let (cols, rows) = terminal::size()?;
    let cols = cols as usize;
    let mut screen = Vec::with_capacity(lines.len().min(rows as usize));

    queue!(out, cursor::MoveTo(0, 0), terminal::Clear(terminal::ClearType::All))?;

    for (row, line) in lines.iter().take(rows as usize).enumerate() {
        queue!(out, cursor::MoveTo(0, row as u16))?;
        if line.highlighted {
            queue!(out, SetBackgroundColor(Color::DarkGrey), SetForegroundColor(Color::White))?;
        }
        let mut budget = cols;
        for span in &line.spans {
            if budget == 0 {
                break;
            }
            let text: String = span.text.chars().take(budget).collect();
            budget -= text.chars().count();
            if !line.highlighted {
                if let Some(color) = span.tone.color() {
                    queue!(out, SetForegroundColor(color))?;
                }
                if span.tone == Tone::Title {
                    queue!(out, SetAttribute(Attribute::Bold))?;
                }
            }
            write!(out, "{}", text)?;
            if !line.highlighted {
                queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;
            }
        }
        if line.highlighted {
            write!(out, "{}", " ".repeat(budget))?;
            queue!(out, ResetColor)?;
        }

        let plain: String = line.text().chars().take(cols).collect();
        if let Some((from, to)) = selection.columns_on_row(row, plain.chars().count()) {
            let covered: String = plain.chars().skip(from).take(to - from).collect();
            queue!(
                out,
                cursor::MoveTo(from as u16, row as u16),
                SetAttribute(Attribute::Reverse)
            )?;
            write!(out, "{}", covered)?;
            queue!(out, SetAttribute(Attribute::Reset))?;
        }
        screen.push(plain);
    }

    out.flush()?;
    Ok(screen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_text_joins_spans() {
        let line = Line::new(vec![Span::plain("├── "), Span::new("Pod", Tone::Accent)]);
        assert_eq!(line.text(), "├── Pod");
        assert_eq!(line.width(), 7);
    }

    #[test]
    fn tones_follow_status() {
        assert_eq!(Tone::for_health(HealthStatus::Degraded), Tone::Bad);
        assert_eq!(Tone::for_sync(SyncStatus::OutOfSync), Tone::Warn);
    }
}
