//! JavaScript grammar adapter using tree-sitter.

use std::path::Path;
use std::time::Duration;

use tree_sitter::Language;

use super::ecmascript;
use crate::analysis::traits::parse_tree;
use crate::analysis::{GrammarAdapter, ParsedFile, SyntaxFile};
use crate::error::ParseError;

pub struct JavaScriptAdapter {
    language: Language,
}

impl JavaScriptAdapter {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

impl Default for JavaScriptAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarAdapter for JavaScriptAdapter {
    fn language_id(&self) -> &'static str {
        "javascript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "mjs", "cjs"]
    }

    fn parse(
        &self,
        path: &Path,
        source: &[u8],
        timeout: Option<Duration>,
    ) -> Result<ParsedFile, ParseError> {
        let tree = parse_tree(&self.language, source, timeout)?;
        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn lower(&self, parsed: &ParsedFile) -> anyhow::Result<SyntaxFile> {
        ecmascript::lower(&self.language, parsed, self.language_id(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{CallSite, Entry, Expr};

    fn lower_js(source: &str) -> SyntaxFile {
        let adapter = JavaScriptAdapter::new();
        let parsed = adapter
            .parse(Path::new("app.js"), source.as_bytes(), None)
            .unwrap();
        adapter.lower(&parsed).unwrap()
    }

    fn call_to<'a>(file: &'a SyntaxFile, method: &str) -> &'a CallSite {
        file.calls
            .iter()
            .find(|c| c.call.callee.last_segment() == Some(method))
            .unwrap()
    }

    #[test]
    fn test_lowers_call_with_object_literal() {
        let file = lower_js(
            r#"
analytics.track("signup_completed", { plan: "pro", trial: true, seats: 3, ...extra });
"#,
        );
        let site = call_to(&file, "track");
        assert_eq!(site.line, 2);
        assert_eq!(site.function, "global");
        assert_eq!(
            site.call.callee.path(),
            Some(vec!["analytics", "track"])
        );
        assert_eq!(
            site.call.positional(0),
            Some(&Expr::String("signup_completed".into()))
        );
        let entries = site.call.positional(1).and_then(|e| e.as_object()).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(Entry::value_of(entries, "trial"), Some(&Expr::Bool));
        assert_eq!(Entry::value_of(entries, "seats"), Some(&Expr::Number));
        assert!(matches!(entries[3], Entry::Spread(Expr::Ident(_))));
    }

    #[test]
    fn test_enclosing_function_names() {
        let file = lower_js(
            r#"
function checkout() {
  analytics.track("a");
}

const onClick = () => {
  analytics.track("b");
};

class Cart {
  submit() {
    analytics.track("c");
  }
}

const handlers = {
  onOpen: function () {
    analytics.track("d");
  },
};

function Banner() {
  useEffect(() => {
    analytics.track("e");
  }, []);
}
"#,
        );
        let functions: Vec<&str> = file
            .calls
            .iter()
            .filter(|c| c.call.callee.last_segment() == Some("track"))
            .map(|c| c.function.as_str())
            .collect();
        assert_eq!(
            functions,
            vec!["checkout", "onClick", "submit", "onOpen", "Banner.useEffect"]
        );
    }

    #[test]
    fn test_const_bindings_and_comments() {
        let file = lower_js(
            r#"
const EVENTS = Object.freeze({ SIGNUP: "user_signup" });
let mutable = "ignored";
const NAME = 'page_view';

// Fired when the landing page renders
analytics.track(NAME);
"#,
        );
        let names: Vec<&str> = file.bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["EVENTS", "NAME"]);

        let site = call_to(&file, "track");
        assert_eq!(
            site.comment.as_deref(),
            Some("Fired when the landing page renders")
        );
    }

    #[test]
    fn test_template_strings() {
        let file = lower_js("track(`plain`, `with ${value}`);\n");
        let site = call_to(&file, "track");
        assert_eq!(site.call.positional(0), Some(&Expr::String("plain".into())));
        assert_eq!(site.call.positional(1), Some(&Expr::Interpolated));
    }

    #[test]
    fn test_syntax_error_is_rejected() {
        let adapter = JavaScriptAdapter::new();
        let result = adapter.parse(
            Path::new("broken.js"),
            b"const ok = 1;\nanalytics.track('x', {\n",
            None,
        );
        assert!(matches!(result, Err(ParseError::Syntax { .. })));
    }
}
