//! Diagnostics for the Sono compiler.
//!
//! One error halts the pipeline; there is no multi-error recovery. The
//! host gets a single [`Error`] carrying an [`ErrorCode`], a message and
//! (except for bind-time signature mismatches) a source location, and
//! chooses between two render formats: an inline code snippet or a plain
//! `file:line` prefix.

mod code;
mod error;
mod report;

pub use code::ErrorCode;
pub use error::{Error, Result, SourceLocation};
pub use report::{render, ReportFormat};
