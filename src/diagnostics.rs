use std::fmt;

use rustyline::error::ReadlineError;
use thiserror::Error;

/// Byte range `start..end` within one source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// 1-based line and column of `start`, columns counted in chars.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let start = self.start.min(source.len());
        let before = source.get(..start).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
        let column = before[line_start..].chars().count() + 1;
        (line, column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Runtime,
}

/// Reader and host failures. Language-level errors are `Value::Error`
/// and never travel through this type.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Multi-line report pointing into `source`: a header with the line and
    /// column, the offending line with a caret under the span, then notes.
    pub fn render(&self, source: &str) -> String {
        let mut out = match self.span {
            Some(span) => {
                let (line, column) = span.line_col(source);
                let text = source.lines().nth(line - 1).unwrap_or("");
                let width = source
                    .get(span.start..span.end)
                    .map_or(1, |s| s.chars().count().max(1));
                format!(
                    "{:?} error at {line}:{column}: {}\n  {text}\n  {}{}\n",
                    self.kind,
                    self.message,
                    " ".repeat(column - 1),
                    "^".repeat(width)
                )
            }
            None => format!("{:?} error: {}\n", self.kind, self.message),
        };
        for note in &self.notes {
            out.push_str(&format!("  note: {note}\n"));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(span) = self.span {
            write!(f, " ({}..{})", span.start, span.end)?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

#[derive(Debug, Error)]
pub enum SprigError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line editor: {0}")]
    Editor(#[from] ReadlineError),
}

pub type Result<T> = std::result::Result<T, SprigError>;
