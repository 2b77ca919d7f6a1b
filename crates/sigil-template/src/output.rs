//! Output sinks for emit-mode rendering.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

/// Receives finished render output.
pub trait OutputSink: Send + Sync {
    /// Appends rendered content to the output.
    fn append_output(&self, content: &str);
}

/// Collects output in memory.
#[derive(Debug, Default)]
pub struct StringSink {
    buffer: Mutex<String>,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything appended so far.
    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Takes the collected output, leaving the sink empty.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl OutputSink for StringSink {
    fn append_output(&self, content: &str) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(content);
    }
}

/// Writes output to an [`io::Write`](std::io::Write) destination.
///
/// Write failures are logged; emit mode has no error channel.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WriterSink<std::io::Stdout> {
    /// A sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> OutputSink for WriterSink<W> {
    fn append_output(&self, content: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer
            .write_all(content.as_bytes())
            .and_then(|()| writer.flush())
        {
            warn!(error = %e, "Failed to write render output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_sink_appends() {
        let sink = StringSink::new();
        sink.append_output("a");
        sink.append_output("b");
        assert_eq!(sink.contents(), "ab");
        assert_eq!(sink.take(), "ab");
        assert_eq!(sink.contents(), "");
    }

    #[test]
    fn test_writer_sink() {
        let sink = WriterSink::new(Vec::new());
        sink.append_output("hello ");
        sink.append_output("world");
        assert_eq!(sink.into_inner(), b"hello world");
    }
}
