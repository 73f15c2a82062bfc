use std::io::{self, Write};

use crossterm::{execute, style::Print};

/// Where yanked text goes.
pub trait Clipboard: Send {
    fn set(&mut self, contents: &str) -> io::Result<()>;
}

/// Copies through the terminal with an OSC 52 escape, so it also works over
/// ssh. Terminals that ignore OSC 52 drop the text silently.
pub struct TerminalClipboard<W: Write + Send> {
    out: W,
}

impl TerminalClipboard<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> TerminalClipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> Clipboard for TerminalClipboard<W> {
    fn set(&mut self, contents: &str) -> io::Result<()> {
        execute!(self.out, Print(osc52_sequence(contents)))
    }
}

fn osc52_sequence(text: &str) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    let encoded = STANDARD.encode(text.as_bytes());
    format!("\x1b]52;c;{encoded}\x1b\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_wraps_base64_text() {
        assert_eq!(osc52_sequence("hi"), "\x1b]52;c;aGk=\x1b\\");
        assert_eq!(osc52_sequence(""), "\x1b]52;c;\x1b\\");
    }

    #[test]
    fn terminal_clipboard_writes_the_escape() {
        let mut clipboard = TerminalClipboard::new(Vec::new());
        clipboard.set("web-5f").unwrap();
        let written = String::from_utf8(clipboard.out).unwrap();
        assert_eq!(written, "\x1b]52;c;d2ViLTVm\x1b\\");
    }
}
