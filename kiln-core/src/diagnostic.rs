//! Diagnostic collection.
//!
//! Every stage and every validation call receives an explicit
//! [`Diagnostics`] handle instead of reaching for a process-wide
//! counter, so several compilation units can be processed side by side
//! (and tested) without sharing error state.

use crate::error::CompileError;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn warning(message: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Error counter plus reporting sink.
///
/// The pipeline only ever increments and queries the counter; it is
/// never reset during a run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    errors: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a recoverable error without interrupting the caller.
    pub fn error(&mut self, span: Option<Span>, message: impl Into<String>) {
        self.push(Diagnostic::error(message, span));
    }

    pub fn warning(&mut self, span: Option<Span>, message: impl Into<String>) {
        self.push(Diagnostic::warning(message, span));
    }

    /// Record a compile error that is about to stop the current unit.
    pub fn report(&mut self, err: &CompileError) {
        self.push(Diagnostic::error(err.message.clone(), err.span));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.errors += 1;
            tracing::debug!(span = ?diagnostic.span, message = %diagnostic.message, "error reported");
        }
        self.entries.push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// The earliest error recorded so far.
    pub fn first_error(&self) -> Option<CompileError> {
        self.errors_since(0).next()
    }

    /// Errors recorded after the first `start` diagnostics.
    pub fn errors_since(&self, start: usize) -> impl Iterator<Item = CompileError> + '_ {
        self.entries
            .iter()
            .skip(start)
            .filter(|d| d.is_error())
            .map(|d| CompileError {
                message: d.message.clone(),
                span: d.span,
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FileId;

    #[test]
    fn counts_only_errors() {
        let mut diag = Diagnostics::new();
        diag.warning(None, "unused name");
        diag.error(Some(Span::new(FileId(1), 3, 4)), "bad thing");
        assert_eq!(diag.len(), 2);
        assert_eq!(diag.error_count(), 1);
        let first = diag.first_error().expect("one error");
        assert_eq!(first.message, "bad thing");
        assert_eq!(first.span, Some(Span::new(FileId(1), 3, 4)));
    }

    #[test]
    fn errors_since_skips_earlier_entries() {
        let mut diag = Diagnostics::new();
        diag.error(None, "first");
        let mark = diag.len();
        diag.report(&CompileError::new("second"));
        let later: Vec<_> = diag.errors_since(mark).collect();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].message, "second");
    }
}
