//! Grammar adapters and the shared syntax model.
//!
//! Each supported language parses with tree-sitter and lowers its tree into
//! a [`SyntaxFile`]: the file's call sites in source order plus its
//! constant-like bindings. Detection works only on that model.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌───────────────┐
//! │ Source bytes    │────▶│ GrammarAdapter   │────▶│ SyntaxFile    │
//! └─────────────────┘     │ (JS, TS, Python, │     │ (CallSites,   │
//!                         │  Go, Ruby)       │     │  Bindings)    │
//!                         └──────────────────┘     │               │
//!                                                  └───────────────┘
//!                                                          │
//!                                                          ▼
//!                         ┌──────────────────┐     ┌───────────────┐
//!                         │ Event Aggregator │◀────│ Call-Site     │
//!                         │                  │     │ Matcher       │
//!                         └──────────────────┘     └───────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/`
//! 2. Implement the `GrammarAdapter` trait, lowering calls and bindings
//! 3. Register the adapter in `languages/mod.rs`

mod languages;
mod syntax;
mod traits;

pub use languages::{
    get_adapter, register_adapters, supported_extensions, GoAdapter, JavaScriptAdapter,
    PythonAdapter, RubyAdapter, TypeScriptAdapter,
};
pub use syntax::{Arg, Binding, CallExpr, CallSite, Entry, Expr, SyntaxFile};
pub use traits::{GrammarAdapter, ParsedFile};
