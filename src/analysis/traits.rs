//! Core traits for grammar adapters.

use std::path::Path;
use std::time::Duration;

use tree_sitter::{Language, Node, Parser, Tree};

use super::SyntaxFile;
use crate::error::ParseError;

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// Lives only for the duration of one file's analysis pass.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path, relative to the scan root.
    pub path: String,
}

impl ParsedFile {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }
}

/// Language-specific grammar adapter.
///
/// Each supported language implements this trait to lower its parse tree
/// into the shared syntax model. Everything downstream of `lower` is
/// language-agnostic.
///
/// # Thread Safety
///
/// tree_sitter::Parser is not Sync, so implementations create a parser per
/// call to `parse`.
pub trait GrammarAdapter: Send + Sync {
    /// Returns the language identifier (e.g., "javascript", "python").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this adapter handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse a source file.
    ///
    /// A tree containing syntax errors is rejected with
    /// [`ParseError::Syntax`]; a parse that outlives `timeout` is rejected with
    /// [`ParseError::TimedOut`].
    fn parse(
        &self,
        path: &Path,
        source: &[u8],
        timeout: Option<Duration>,
    ) -> Result<ParsedFile, ParseError>;

    /// Lower a parsed file into call sites and constant bindings.
    fn lower(&self, parsed: &ParsedFile) -> anyhow::Result<SyntaxFile>;

    /// Check if this adapter handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}

/// Run a tree-sitter parse with an optional time bound and reject broken trees.
pub(crate) fn parse_tree(
    language: &Language,
    source: &[u8],
    timeout: Option<Duration>,
) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| ParseError::Language(e.to_string()))?;

    if let Some(limit) = timeout {
        // Zero means "unbounded" to tree-sitter.
        let micros = u64::try_from(limit.as_micros()).unwrap_or(u64::MAX).max(1);
        parser.set_timeout_micros(micros);
    }

    let tree = parser.parse(source, None).ok_or_else(|| match timeout {
        Some(limit) => ParseError::TimedOut(limit),
        None => ParseError::Language("parser returned no tree".to_string()),
    })?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(ParseError::Syntax {
            line: first_error_line(root),
        });
    }
    Ok(tree)
}

/// 1-based line of the first ERROR or MISSING node in document order.
fn first_error_line(root: Node) -> usize {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return node.start_position().row + 1;
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    root.start_position().row + 1
}
