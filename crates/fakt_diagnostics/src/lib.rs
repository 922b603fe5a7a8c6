//! Structured warnings for the Fakt generation engine.
//!
//! Nothing in the engine aborts a compilation pass. Degradations such as an
//! unreadable cache or an unroutable artifact are reported as [`Diagnostic`]
//! values into a thread-safe [`DiagnosticSink`], and [`DiagnosticRenderer`]
//! implementations format them for a terminal or as JSON.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
