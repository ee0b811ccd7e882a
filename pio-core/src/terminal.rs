//! Terminal abstraction behind the system console device.
//!
//! The `Terminal` trait provides character I/O that works identically
//! for both testing (HeadlessTerminal) and real terminals.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// Host side of the system console.
pub trait Terminal: Send {
    /// Write a character to the terminal.
    fn write_byte(&mut self, ch: u8) -> io::Result<()>;

    /// Wait up to `timeout` for input. Returns true if a character is ready.
    fn poll_input(&mut self, timeout: Duration) -> bool;

    /// Read one character. When `blocking` is false, returns None if nothing
    /// is ready.
    fn read_byte(&mut self, blocking: bool) -> io::Result<Option<u8>>;
}

/// Headless terminal for testing - captures output, provides queued input.
#[derive(Default)]
pub struct HeadlessTerminal {
    output: Vec<u8>,
    input: VecDeque<u8>,
}

impl HeadlessTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-queued input.
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            output: Vec::new(),
            input: input.iter().copied().collect(),
        }
    }

    /// Queue input characters.
    pub fn queue_input(&mut self, input: &[u8]) {
        self.input.extend(input.iter().copied());
    }

    /// Get all output as bytes.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Get output as string (lossy UTF-8 conversion).
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Terminal for HeadlessTerminal {
    fn write_byte(&mut self, ch: u8) -> io::Result<()> {
        self.output.push(ch);
        Ok(())
    }

    fn poll_input(&mut self, _timeout: Duration) -> bool {
        !self.input.is_empty()
    }

    fn read_byte(&mut self, _blocking: bool) -> io::Result<Option<u8>> {
        // Nothing will ever arrive, so a blocking read would hang forever
        Ok(self.input.pop_front())
    }
}
