//! Stacktrace Translator
//!
//! Turns the raw return addresses in a Spring crash or hang-detection log
//! into source file and line numbers, using the debug-symbol archive the
//! build server published for that exact build.
//!
//! This crate provides the core implementation for the
//! `stacktrace-translator` CLI and JSON-RPC service.
//!
//! ## Getting Started
//!
//! ```bash
//! stacktrace-translator translate infolog.txt --symbols /srv/www
//! stacktrace-translator serve --listen 0.0.0.0:8000
//! ```
//!
//! Library users go through [`translator::StacktraceTranslator`].

pub mod commands;
pub mod output;
pub mod parser;
pub mod rpc;
pub mod symbols;
pub mod translator;
pub mod utils;

pub use translator::StacktraceTranslator;
