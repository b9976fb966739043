//! Core library for the sprig Lisp runtime.
//! Implements reading, evaluation with curried and variadic lambdas, the
//! builtin catalog, the host-object bridge, and the interactive shell.

pub mod bridge;
pub mod builtins;
pub mod diagnostics;
pub mod environment;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod value;

pub use bridge::{DetachedBridge, ForeignBridge, ForeignHandle, ForeignKind, RecordingBridge};
pub use diagnostics::{Diagnostic, DiagnosticKind, SourceSpan, SprigError};
pub use repl::{Repl, ReplConfig};
pub use runtime::{Interpreter, LoadSummary};
pub use value::Value;
