pub mod console;
pub mod memory;

pub use console::ConsoleSink;
pub use memory::MemoryWriter;

use crate::event::LogEvent;

/// Trait for log output destinations
pub trait LogSink: Send + Sync {
    /// Write one event as one line
    fn log(&self, event: &LogEvent) {
        self.log_all(std::slice::from_ref(event));
    }

    /// Write events in order, one line each, with no other call's lines
    /// between them
    fn log_all(&self, events: &[LogEvent]);

    /// Flush any buffered output
    fn flush(&self);
}
