//! Detection of analytics tracking calls.
//!
//! The pipeline per scan is:
//!
//! ```text
//! files ──► adapter (parse + lower) ──► FileScope (constants)
//!                                           │
//!                                           ▼
//!            custom signatures / provider rules ──► Detection
//!                                           │
//!            EventAggregator (sorted path order) ◄──┘
//! ```

mod aggregate;
mod constants;
mod files;
mod matcher;
mod properties;
mod providers;
mod runner;
mod signature;
mod types;

pub use aggregate::EventAggregator;
pub use constants::{ConstValue, ConstantTable, FileScope, ObjectBindings};
pub use files::{collect_sources, relative_path, FileSet, IgnoreRules, SourceFile};
pub use matcher::{Detection, FileMatches, Matcher};
pub use properties::{merge_property, merge_schema, PropertyExtractor, TypeConflict};
pub use providers::{dispatch, rules, ArgSlot, Callee, Convention, Dialect, Provider, Rule};
pub use runner::{
    CancellationToken, ScanOptions, ScanOutcome, Scanner, DEFAULT_FILE_TIMEOUT,
    DEFAULT_MAX_FILE_SIZE,
};
pub use signature::{CustomSignature, ExtraParam};
pub use types::{Issue, IssueKind, Severity};
