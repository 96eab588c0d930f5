//! Diagnostic types for error reporting.

use crate::source::{SourceMap, Span};
use std::fmt;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Message,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Message => "message",
        }
    }
}

/// A single diagnostic, attached to a source location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(Severity::Message, message)
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Render the diagnostic with source context.
    pub fn render(&self, source_map: &SourceMap) -> String {
        let mut output = String::new();
        output.push_str(&format!("{}: {}\n", self.severity.as_str(), self.message));

        if let Some(span) = self.span {
            if let Some(source) = source_map.get(span.source) {
                let (line, col) = source.line_col(span.start);
                output.push_str(&format!("  --> {}:{}:{}\n", source.name(), line, col));
                output.push_str(&source.snippet(line));
                output.push('\n');
            }
        }

        for note in &self.notes {
            output.push_str(&format!("  = note: {}\n", note));
        }

        output
    }
}

/// Accumulated diagnostics for one compilation.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::error(message).with_span(span));
    }

    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::warning(message).with_span(span));
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Render all diagnostics.
    pub fn render(&self, source_map: &SourceMap) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.render(source_map))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diag in &self.diagnostics {
            writeln!(f, "{}: {}", diag.severity.as_str(), diag.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceId;

    #[test]
    fn error_counting() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_errors());

        diags.warning(Span::new(SourceId(0), 0, 1), "odd but fine");
        assert!(!diags.has_errors());

        diags.error(Span::new(SourceId(0), 0, 1), "bad");
        diags.error(Span::new(SourceId(0), 2, 3), "worse");
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 2);
        assert_eq!(diags.len(), 3);
    }
}
