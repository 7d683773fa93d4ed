//! Line-oriented console output.
//!
//! Results go to stdout as `info` or `data` lines; failures go to stderr as
//! `error` lines. With prefixing enabled every line carries its channel so
//! that wrapping tools can split the stream.

use std::io::Write;

/// Output channel of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Info,
    Data,
    Error,
}

impl Channel {
    fn label(self) -> &'static str {
        match self {
            Channel::Info => "info",
            Channel::Data => "data",
            Channel::Error => "error",
        }
    }
}

/// Writes text to the console, one channel per call.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    prefix: bool,
}

impl Printer {
    /// Create a printer.
    pub fn new(prefix: bool) -> Self {
        Self { prefix }
    }

    /// Progress and status messages.
    pub fn info(&self, text: &str) {
        self.emit(Channel::Info, text);
    }

    /// Command results.
    pub fn data(&self, text: &str) {
        self.emit(Channel::Data, text);
    }

    /// Failures.
    pub fn error(&self, text: &str) {
        self.emit(Channel::Error, text);
    }

    fn emit(&self, channel: Channel, text: &str) {
        let rendered = self.render(channel, text);
        let _ = match channel {
            Channel::Error => std::io::stderr().write_all(rendered.as_bytes()),
            Channel::Info | Channel::Data => std::io::stdout().write_all(rendered.as_bytes()),
        };
    }

    /// Text as it would be written, newline-terminated.
    pub fn render(&self, channel: Channel, text: &str) -> String {
        let mut out = String::new();
        for line in text.lines() {
            if self.prefix {
                out.push_str(channel.label());
                out.push_str(": ");
            }
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
