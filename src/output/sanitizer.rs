//! Removal of terminal control sequences from decoded lines.

use vte::{Params, Parser, Perform};

/// Cleans the text of a single line produced by a pseudo-terminal.
///
/// Escape sequences (colors, cursor movement, window titles) are dropped,
/// backspaces erase the preceding character, and tabs survive. Any other
/// C0 control byte is discarded.
pub struct LineSanitizer;

impl LineSanitizer {
    /// Return `line` with all control sequences removed.
    pub fn clean(line: &str) -> String {
        // Fast path: nothing that vte would have to interpret.
        if !line.bytes().any(|b| (b < 0x20 && b != b'\t') || b == 0x7f) {
            return line.to_string();
        }

        let mut text = VisibleText::default();
        let mut parser = Parser::new();
        parser.advance(&mut text, line.as_bytes());
        text.0
    }
}

#[derive(Default)]
struct VisibleText(String);

impl Perform for VisibleText {
    fn print(&mut self, c: char) {
        self.0.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\t' => self.0.push('\t'),
            0x08 => {
                self.0.pop();
            }
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(
        &mut self,
        _params: &Params,
        _intermediates: &[u8],
        _ignore: bool,
        _action: char,
    ) {
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}
