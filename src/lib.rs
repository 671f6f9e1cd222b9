//! Pattern-based detection of six vulnerability classes: command injection,
//! SQL injection, path traversal, SSRF, hardcoded secrets and weak hashing.
//!
//! Source files are reduced to lexical fragments, grouped into statements and
//! matched against a registry of rules over a sliding statement window. The
//! result is a deterministic [`report::Report`].

pub mod cli;
pub mod commands;
pub mod engine;
pub mod errors;
pub mod output;
pub mod report;
pub mod risk;
pub mod rules;
pub mod source;
pub mod tokenizer;
pub mod utils;
pub mod walk;

pub use engine::{CancelToken, Engine, ScanOptions};
pub use errors::{SiftError, SiftResult};
pub use report::{Finding, Report};
pub use rules::{Category, RuleRegistry, Severity};
pub use source::SourceUnit;
