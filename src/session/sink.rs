//! Destinations for job output.

/// Receives the lines produced by an operation.
///
/// Each poll hands over its lines in one call, so an implementation can
/// flush once per batch.
#[cfg_attr(test, mockall::automock)]
pub trait LogSink {
    /// Consumes one batch of lines.
    fn emit(&mut self, lines: &[String]);
}

/// Collects every emitted line in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectingSink {
    lines: Vec<String>,
}

impl CollectingSink {
    /// Lines emitted so far, in order.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl LogSink for CollectingSink {
    fn emit(&mut self, lines: &[String]) {
        self.lines.extend_from_slice(lines);
    }
}

impl<S: LogSink + ?Sized> LogSink for &mut S {
    fn emit(&mut self, lines: &[String]) {
        (**self).emit(lines);
    }
}
