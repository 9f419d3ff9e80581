//! Character channels for standard I/O

use std::collections::VecDeque;
use std::fmt;

/// Default channel capacity in characters
pub const DEFAULT_CAPACITY: usize = 4096;

/// Bounded, non-blocking character queue
///
/// A closed channel accepts no more input; readers see end of input once it
/// is drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharChannel {
    buffer: VecDeque<char>,
    capacity: usize,
    closed: bool,
}

impl CharChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            closed: false,
        }
    }

    /// Append `c`, handing it back if the channel is full or closed
    pub fn try_push(&mut self, c: char) -> Result<(), char> {
        if self.closed || self.buffer.len() >= self.capacity {
            return Err(c);
        }
        self.buffer.push_back(c);
        Ok(())
    }

    pub fn try_pop(&mut self) -> Option<char> {
        self.buffer.pop_front()
    }

    /// Push as much of `text` as fits; returns the number of characters taken
    pub fn push_str(&mut self, text: &str) -> usize {
        text.chars().take_while(|&c| self.try_push(c).is_ok()).count()
    }

    /// Remove and return a full line, including its newline
    ///
    /// Once closed, the remaining characters count as a final line, which
    /// then has no newline.
    pub fn take_line(&mut self) -> Option<String> {
        match self.buffer.iter().position(|&c| c == '\n') {
            Some(end) => Some(self.buffer.drain(..=end).collect()),
            None if self.closed && !self.buffer.is_empty() => Some(self.buffer.drain(..).collect()),
            None => None,
        }
    }

    /// Remove everything buffered
    pub fn drain_string(&mut self) -> String {
        self.buffer.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots
    pub fn available(&self) -> usize {
        self.capacity - self.buffer.len()
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closed and fully drained
    pub fn at_end(&self) -> bool {
        self.closed && self.buffer.is_empty()
    }
}

impl Default for CharChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// All-or-nothing writes: a string that does not fit is rejected whole
impl fmt::Write for CharChannel {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.closed || s.chars().count() > self.available() {
            return Err(fmt::Error);
        }
        self.push_str(s);
        Ok(())
    }
}

/// Standard channels of a machine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channels {
    pub stdin: CharChannel,
    pub stdout: CharChannel,
    pub stderr: CharChannel,
}

impl Channels {
    pub fn new(capacity: usize) -> Self {
        Self {
            stdin: CharChannel::new(capacity),
            stdout: CharChannel::new(capacity),
            stderr: CharChannel::new(capacity),
        }
    }
}
