//! Trackscan - analytics tracking-plan extraction.
//!
//! Trackscan walks a source tree, finds every call site that fires an
//! analytics event across a dozen provider SDKs and user-declared wrapper
//! functions, resolves event names through same-file constants, infers
//! property schemas from literal payloads, and emits one deduplicated,
//! versioned tracking plan.
//!
//! # Architecture
//!
//! The codebase uses tree-sitter for AST-based analysis:
//!
//! - `analysis`: grammar adapters lowering parse trees into a shared syntax model
//! - `detect`: constant resolution, provider dispatch, property inference, aggregation
//! - `schema`: the versioned output document
//! - `config`: YAML configuration file
//! - `git`: repository metadata
//! - `report`: human-readable output
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/` for examples. Implement `GrammarAdapter`,
//! register it in `languages/mod.rs`, and map its language id to a
//! `Dialect` with provider rules in `detect/providers.rs`.
//!
//! # Example
//!
//! ```no_run
//! use trackscan::Scanner;
//!
//! let outcome = Scanner::new("./web").concurrency(4).run()?;
//! println!("{}", outcome.result.to_yaml()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod git;
pub mod report;
pub mod schema;

pub use analysis::{get_adapter, register_adapters, GrammarAdapter, SyntaxFile};
pub use config::Config;
pub use detect::{
    CancellationToken, CustomSignature, Issue, IssueKind, Provider, ScanOptions, ScanOutcome,
    Scanner,
};
pub use error::{ScanError, SchemaError, SignatureError};
pub use schema::{Event, Implementation, OutputFormat, Property, PropertyType, ScanResult};
