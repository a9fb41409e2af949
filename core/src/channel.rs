//! Line-oriented channels.
//!
//! Transports are reduced to "is a line available" and "write a line". Sinks
//! are fire-and-forget, like printing to a serial port that may have nobody
//! listening.

use std::collections::VecDeque;

use crate::dispatch::OutputMode;

pub trait LineSource {
    /// Next complete line without its terminator, if one is buffered.
    fn read_line(&mut self) -> Option<String>;
}

pub trait LineSink {
    fn write_line(&mut self, line: &str);
}

impl<T: LineSource + ?Sized> LineSource for &mut T {
    fn read_line(&mut self) -> Option<String> {
        (**self).read_line()
    }
}

impl<T: LineSink + ?Sized> LineSink for &mut T {
    fn write_line(&mut self, line: &str) {
        (**self).write_line(line)
    }
}

/// The three channels the device talks to.
///
/// `console` and `wireless` both carry configuration lines in and replies out.
/// `forward` is write-only and only used in [`OutputMode::Forwarded`].
pub struct Ports<C, W, F> {
    pub console: C,
    pub wireless: W,
    pub forward: F,
}

impl<C: LineSink, W: LineSink, F: LineSink> Ports<C, W, F> {
    pub fn new(console: C, wireless: W, forward: F) -> Self {
        Self { console, wireless, forward }
    }

    /// Write a line to both text sinks.
    pub fn announce(&mut self, line: &str) {
        self.console.write_line(line);
        self.wireless.write_line(line);
    }

    /// Sink that receives dispatched tag commands.
    pub fn output(&mut self, mode: OutputMode) -> &mut dyn LineSink {
        match mode {
            OutputMode::Local => &mut self.console,
            OutputMode::Forwarded => &mut self.forward,
        }
    }
}

/// In-memory channel: queued input lines and a record of everything written.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    incoming: VecDeque<String>,
    written: Vec<String>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_incoming(&mut self, line: impl Into<String>) {
        self.incoming.push_back(line.into());
    }

    pub fn pending(&self) -> usize {
        self.incoming.len()
    }

    pub fn written(&self) -> &[String] {
        &self.written
    }

    pub fn take_written(&mut self) -> Vec<String> {
        std::mem::take(&mut self.written)
    }
}

impl LineSource for LineBuffer {
    fn read_line(&mut self) -> Option<String> {
        self.incoming.pop_front()
    }
}

impl LineSink for LineBuffer {
    fn write_line(&mut self, line: &str) {
        self.written.push(line.to_owned());
    }
}
