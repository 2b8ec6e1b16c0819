//! Python grammar adapter using tree-sitter.

use std::path::Path;
use std::time::Duration;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Query, QueryCursor};

use super::{clean_comment, unescape, MAX_EXPR_DEPTH};
use crate::analysis::traits::parse_tree;
use crate::analysis::{
    Arg, Binding, CallExpr, CallSite, Entry, Expr, GrammarAdapter, ParsedFile, SyntaxFile,
};
use crate::error::ParseError;

const CALL_QUERY: &str = r#"
(call) @call
"#;

pub struct PythonAdapter {
    language: Language,
}

impl PythonAdapter {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn call_sites(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<CallSite>> {
        let query = Query::new(&self.language, CALL_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let lowering = Lowering { parsed };
        let mut sites = Vec::new();
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                let Some(call) = lowering.call(node, 0) else {
                    continue;
                };
                sites.push(CallSite {
                    call,
                    line: node.start_position().row + 1,
                    function: lowering.enclosing_function(node),
                    comment: lowering.leading_comment(node),
                });
            }
        }
        Ok(sites)
    }

    /// Module-level assignments, plus class bodies lowered to objects so
    /// `Events.SIGNUP` resolves like a frozen map.
    fn bindings(&self, parsed: &ParsedFile) -> Vec<Binding> {
        let lowering = Lowering { parsed };
        let root = parsed.tree.root_node();
        let mut bindings = Vec::new();

        let mut cursor = root.walk();
        for statement in root.named_children(&mut cursor) {
            match statement.kind() {
                "expression_statement" => {
                    if let Some((name, value)) = lowering.assignment(statement) {
                        bindings.push(Binding {
                            name: parsed.node_text(name).to_string(),
                            value,
                            line: name.start_position().row + 1,
                        });
                    }
                }
                "class_definition" => bindings.extend(lowering.class_binding(statement)),
                "decorated_definition" => {
                    if let Some(class) = statement
                        .child_by_field_name("definition")
                        .filter(|d| d.kind() == "class_definition")
                    {
                        bindings.extend(lowering.class_binding(class));
                    }
                }
                _ => {}
            }
        }
        bindings
    }
}

impl Default for PythonAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarAdapter for PythonAdapter {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py"]
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
        Ok(SyntaxFile {
            path: parsed.path.clone(),
            language: self.language_id(),
            calls: self.call_sites(parsed)?,
            bindings: self.bindings(parsed),
        })
    }
}

struct Lowering<'a> {
    parsed: &'a ParsedFile,
}

impl<'a> Lowering<'a> {
    fn text(&self, node: Node) -> &'a str {
        self.parsed.node_text(node)
    }

    /// `NAME = value` or `NAME: T = value` as the sole expression of a statement.
    fn assignment<'t>(&self, statement: Node<'t>) -> Option<(Node<'t>, Expr)> {
        let assignment = statement.named_child(0)?;
        if assignment.kind() != "assignment" {
            return None;
        }
        let left = assignment.child_by_field_name("left")?;
        let right = assignment.child_by_field_name("right")?;
        if left.kind() != "identifier" {
            return None;
        }
        Some((left, self.expr(right, 0)))
    }

    fn class_binding(&self, class: Node) -> Option<Binding> {
        let name = class.child_by_field_name("name")?;
        let body = class.child_by_field_name("body")?;

        let mut entries = Vec::new();
        let mut cursor = body.walk();
        for statement in body.named_children(&mut cursor) {
            if statement.kind() != "expression_statement" {
                continue;
            }
            if let Some((key, value)) = self.assignment(statement) {
                entries.push(Entry::Property {
                    key: self.text(key).to_string(),
                    value,
                });
            }
        }

        Some(Binding {
            name: self.text(name).to_string(),
            value: Expr::Object(entries),
            line: name.start_position().row + 1,
        })
    }

    fn call(&self, node: Node, depth: usize) -> Option<CallExpr> {
        let function = node.child_by_field_name("function")?;
        let arguments = node.child_by_field_name("arguments")?;
        if arguments.kind() != "argument_list" {
            return None;
        }

        let mut args = Vec::new();
        let mut cursor = arguments.walk();
        for arg in arguments.named_children(&mut cursor) {
            match arg.kind() {
                "comment" => {}
                "keyword_argument" => {
                    let (Some(name), Some(value)) = (
                        arg.child_by_field_name("name"),
                        arg.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    args.push(Arg::keyword(self.text(name), self.expr(value, depth + 1)));
                }
                "list_splat" | "dictionary_splat" => args.push(Arg::positional(Expr::Dynamic)),
                _ => args.push(Arg::positional(self.expr(arg, depth + 1))),
            }
        }

        Some(CallExpr {
            callee: self.expr(function, depth + 1),
            args,
        })
    }

    fn expr(&self, node: Node, depth: usize) -> Expr {
        if depth > MAX_EXPR_DEPTH {
            return Expr::Dynamic;
        }

        match node.kind() {
            "string" => self.string(node),
            "concatenated_string" => {
                let mut text = String::new();
                let mut cursor = node.walk();
                for part in node.named_children(&mut cursor) {
                    match self.string(part) {
                        Expr::String(s) => text.push_str(&s),
                        _ => return Expr::Interpolated,
                    }
                }
                Expr::String(text)
            }
            "integer" | "float" => Expr::Number,
            "true" | "false" | "not_operator" => Expr::Bool,
            "none" => Expr::Null,
            "identifier" => Expr::Ident(self.text(node).to_string()),
            "attribute" => match (
                node.child_by_field_name("object"),
                node.child_by_field_name("attribute"),
            ) {
                (Some(object), Some(attribute)) => {
                    Expr::member(self.expr(object, depth + 1), self.text(attribute))
                }
                _ => Expr::Dynamic,
            },
            "subscript" => match (
                node.child_by_field_name("value"),
                node.child_by_field_name("subscript"),
            ) {
                (Some(value), Some(index)) if index.kind() == "string" => {
                    match self.string(index) {
                        Expr::String(key) => Expr::member(self.expr(value, depth + 1), key),
                        _ => Expr::Dynamic,
                    }
                }
                _ => Expr::Dynamic,
            },
            "call" => match self.call(node, depth) {
                Some(call) => Expr::Call(Box::new(call)),
                None => Expr::Dynamic,
            },
            "dictionary" => Expr::Object(self.entries(node, depth)),
            "list" | "tuple" | "set" => {
                let mut cursor = node.walk();
                let items = node
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment")
                    .map(|n| match n.kind() {
                        "list_splat" => Expr::Dynamic,
                        _ => self.expr(n, depth + 1),
                    })
                    .collect();
                Expr::Array(items)
            }
            "parenthesized_expression" => {
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .find(|n| n.kind() != "comment");
                match inner {
                    Some(inner) => self.expr(inner, depth + 1),
                    None => Expr::Dynamic,
                }
            }
            "unary_operator" => match node.child_by_field_name("argument") {
                Some(arg) if matches!(arg.kind(), "integer" | "float") => Expr::Number,
                _ => Expr::Dynamic,
            },
            _ => Expr::Dynamic,
        }
    }

    fn string(&self, node: Node) -> Expr {
        if node.kind() != "string" {
            return Expr::Dynamic;
        }

        let mut start = None;
        let mut end = None;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "interpolation" => return Expr::Interpolated,
                "string_start" => start = Some(child),
                "string_end" => end = Some(child),
                _ => {}
            }
        }

        let (Some(start), Some(end)) = (start, end) else {
            return Expr::Dynamic;
        };
        let raw = self
            .parsed
            .source
            .get(start.end_byte()..end.start_byte())
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .unwrap_or("");

        let prefix = self.text(start);
        if prefix.contains(['r', 'R']) {
            Expr::String(raw.to_string())
        } else {
            Expr::String(unescape(raw))
        }
    }

    fn entries(&self, node: Node, depth: usize) -> Vec<Entry> {
        let mut entries = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "pair" => {
                    let (Some(key), Some(value)) = (
                        child.child_by_field_name("key"),
                        child.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    let value = self.expr(value, depth + 1);
                    match self.expr(key, depth + 1) {
                        Expr::String(key) => entries.push(Entry::Property { key, value }),
                        key => entries.push(Entry::Computed { key, value }),
                    }
                }
                "dictionary_splat" => {
                    let source = match child.named_child(0) {
                        Some(inner) => self.expr(inner, depth + 1),
                        None => Expr::Dynamic,
                    };
                    entries.push(Entry::Spread(source));
                }
                _ => {}
            }
        }
        entries
    }

    fn enclosing_function(&self, node: Node) -> String {
        let mut current = node.parent();
        while let Some(ancestor) = current {
            if ancestor.kind() == "function_definition" {
                if let Some(name) = ancestor.child_by_field_name("name") {
                    return self.text(name).to_string();
                }
            }
            current = ancestor.parent();
        }
        "global".to_string()
    }

    fn leading_comment(&self, node: Node) -> Option<String> {
        let mut statement = node;
        while let Some(parent) = statement.parent() {
            if matches!(parent.kind(), "module" | "block") {
                break;
            }
            statement = parent;
        }

        // A comment above the first statement of a block attaches before the block.
        let comment = statement.prev_sibling().or_else(|| {
            statement
                .parent()
                .filter(|p| p.kind() == "block")
                .and_then(|block| block.prev_sibling())
        })?;
        if comment.kind() != "comment"
            || comment.end_position().row + 1 != statement.start_position().row
        {
            return None;
        }
        clean_comment(self.text(comment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower_py(source: &str) -> SyntaxFile {
        let adapter = PythonAdapter::new();
        let parsed = adapter
            .parse(Path::new("app.py"), source.as_bytes(), None)
            .unwrap();
        adapter.lower(&parsed).unwrap()
    }

    #[test]
    fn test_keyword_arguments_and_dicts() {
        let file = lower_py(
            r#"
def signup(user_id):
    # New account created
    posthog.capture(user_id, event="signup", properties={"plan": "pro", "seats": 2, **extra})
"#,
        );
        let site = &file.calls[0];
        assert_eq!(site.line, 4);
        assert_eq!(site.function, "signup");
        assert_eq!(site.comment.as_deref(), Some("New account created"));
        assert_eq!(
            site.call.keyword("event"),
            Some(&Expr::String("signup".into()))
        );
        let entries = site.call.keyword("properties").and_then(|e| e.as_object()).unwrap();
        assert_eq!(Entry::value_of(entries, "seats"), Some(&Expr::Number));
        assert!(matches!(entries[2], Entry::Spread(_)));
    }

    #[test]
    fn test_module_and_class_bindings() {
        let file = lower_py(
            r#"
SIGNUP = "user_signup"
count: int = 3

class Events:
    PURCHASE = "order_completed"
    REFUND = f"refund_{SUFFIX}"

def helper():
    LOCAL = "not_module_level"
"#,
        );
        let names: Vec<&str> = file.bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["SIGNUP", "count", "Events"]);

        let events = file.bindings[2].value.as_object().unwrap();
        assert_eq!(
            Entry::value_of(events, "PURCHASE"),
            Some(&Expr::String("order_completed".into()))
        );
        assert_eq!(Entry::value_of(events, "REFUND"), Some(&Expr::Interpolated));
    }

    #[test]
    fn test_module_level_call_is_global() {
        let file = lower_py("analytics.track(uid, \"boot\", [1, 2])\n");
        assert_eq!(file.calls.len(), 1);
        assert_eq!(file.calls[0].function, "global");
        assert_eq!(file.calls[0].line, 1);
    }

    #[test]
    fn test_syntax_error_is_rejected() {
        let adapter = PythonAdapter::new();
        let result = adapter.parse(Path::new("bad.py"), b"def broken(:\n    pass\n", None);
        assert!(matches!(result, Err(ParseError::Syntax { .. })));
    }
}
