//! Terminal output for the client.
//!
//! Received frames arrive while rustyline owns the prompt line, so every
//! printed block is followed by a fresh prompt.

use std::io::Write;

/// Print a formatted block and redraw the `<room>> ` prompt below it
pub fn show(block: &str, room_label: &str) {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{}{}> ", block, room_label).ok();
    stdout.flush().ok();
}
