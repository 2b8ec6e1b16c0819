//! Grammar adapter implementations.

mod ecmascript;
mod go;
mod javascript;
mod python;
mod ruby;
mod typescript;

pub use go::GoAdapter;
pub use javascript::JavaScriptAdapter;
pub use python::PythonAdapter;
pub use ruby::RubyAdapter;
pub use typescript::TypeScriptAdapter;

use super::GrammarAdapter;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Static storage for Go adapter.
static GO_ADAPTER: OnceCell<GoAdapter> = OnceCell::new();

/// Static storage for JavaScript adapter.
static JAVASCRIPT_ADAPTER: OnceCell<JavaScriptAdapter> = OnceCell::new();

/// Static storage for Python adapter.
static PYTHON_ADAPTER: OnceCell<PythonAdapter> = OnceCell::new();

/// Static storage for Ruby adapter.
static RUBY_ADAPTER: OnceCell<RubyAdapter> = OnceCell::new();

/// Static storage for TypeScript adapter.
static TYPESCRIPT_ADAPTER: OnceCell<TypeScriptAdapter> = OnceCell::new();

/// Whether adapters have been registered.
static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Register all available grammar adapters.
///
/// This is idempotent - calling it multiple times is safe.
pub fn register_adapters() {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return;
    }

    GO_ADAPTER.get_or_init(GoAdapter::new);
    JAVASCRIPT_ADAPTER.get_or_init(JavaScriptAdapter::new);
    PYTHON_ADAPTER.get_or_init(PythonAdapter::new);
    RUBY_ADAPTER.get_or_init(RubyAdapter::new);
    TYPESCRIPT_ADAPTER.get_or_init(TypeScriptAdapter::new);
}

/// Get an adapter for the given file extension.
///
/// Returns None if no adapter is registered for the extension.
pub fn get_adapter(ext: &str) -> Option<&'static dyn GrammarAdapter> {
    let adapter: &'static dyn GrammarAdapter = match ext {
        "js" | "jsx" | "mjs" | "cjs" => JAVASCRIPT_ADAPTER.get_or_init(JavaScriptAdapter::new),
        "ts" | "tsx" | "mts" | "cts" => TYPESCRIPT_ADAPTER.get_or_init(TypeScriptAdapter::new),
        "py" => PYTHON_ADAPTER.get_or_init(PythonAdapter::new),
        "go" => GO_ADAPTER.get_or_init(GoAdapter::new),
        "rb" => RUBY_ADAPTER.get_or_init(RubyAdapter::new),
        _ => return None,
    };
    Some(adapter)
}

/// All file extensions some adapter handles.
pub fn supported_extensions() -> &'static [&'static str] {
    &[
        "js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts", "py", "go", "rb",
    ]
}

/// Nesting beyond this lowers to `Expr::Dynamic`.
pub(super) const MAX_EXPR_DEPTH: usize = 64;

/// Remove one layer of matching quote characters.
pub(super) fn strip_quotes(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && matches!(first, b'"' | b'\'' | b'`') {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

/// Decode the common backslash escapes of string literals.
pub(super) fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Strip comment markers (`//`, `#`, `/* */`, leading `*`) and join lines.
pub(super) fn clean_comment(raw: &str) -> Option<String> {
    let body = raw
        .trim()
        .trim_start_matches("/**")
        .trim_start_matches("/*")
        .trim_end_matches("*/");

    let text = body
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches("//")
                .trim_start_matches('#')
                .trim_start_matches('*')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes_and_unescape() {
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("`abc`"), "abc");
        assert_eq!(strip_quotes("'abc\""), "'abc\"");
        assert_eq!(unescape(r#"it\'s \"here\"\n"#), "it's \"here\"\n");
    }

    #[test]
    fn test_clean_comment() {
        assert_eq!(
            clean_comment("// Fired when checkout completes").as_deref(),
            Some("Fired when checkout completes")
        );
        assert_eq!(
            clean_comment("/**\n * Signup funnel\n * step two\n */").as_deref(),
            Some("Signup funnel step two")
        );
        assert_eq!(clean_comment("#   ").as_deref(), None);
    }

    #[test]
    fn test_every_supported_extension_has_adapter() {
        for ext in supported_extensions() {
            let adapter = get_adapter(ext).unwrap();
            assert!(adapter.handles_extension(ext), "{} not handled", ext);
        }
        assert_eq!(get_adapter("rb").map(|a| a.language_id()), Some("ruby"));
        assert_eq!(get_adapter("go").map(|a| a.language_id()), Some("go"));
        assert!(get_adapter("java").is_none());
    }
}
