//! TypeScript grammar adapter using tree-sitter.
//!
//! `.tsx` files parse with the TSX dialect; everything else uses plain
//! TypeScript, where `<T>expr` is a type assertion rather than JSX.

use std::path::Path;
use std::time::Duration;

use tree_sitter::Language;

use super::ecmascript;
use crate::analysis::traits::parse_tree;
use crate::analysis::{GrammarAdapter, ParsedFile, SyntaxFile};
use crate::error::ParseError;

pub struct TypeScriptAdapter {
    typescript: Language,
    tsx: Language,
}

impl TypeScriptAdapter {
    pub fn new() -> Self {
        Self {
            typescript: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            tsx: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn language_for(&self, path: &Path) -> &Language {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") => &self.tsx,
            _ => &self.typescript,
        }
    }
}

impl Default for TypeScriptAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarAdapter for TypeScriptAdapter {
    fn language_id(&self) -> &'static str {
        "typescript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "mts", "cts"]
    }

    fn parse(
        &self,
        path: &Path,
        source: &[u8],
        timeout: Option<Duration>,
    ) -> Result<ParsedFile, ParseError> {
        let tree = parse_tree(self.language_for(path), source, timeout)?;
        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn lower(&self, parsed: &ParsedFile) -> anyhow::Result<SyntaxFile> {
        let language = self.language_for(Path::new(&parsed.path));
        ecmascript::lower(language, parsed, self.language_id(), true)
    }
}
