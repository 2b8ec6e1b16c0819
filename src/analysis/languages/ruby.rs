//! Ruby grammar adapter using tree-sitter.
//!
//! Bare `key: value` arguments lower to keyword arguments, so
//! `Analytics.track(event: 'x')` reads like a Python keyword call. Constants
//! assigned inside a module become members of an object named after it, which
//! lets `TelemetryHelper::FINISHED` resolve like `Events.FINISHED`.

use std::collections::BTreeMap;
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

/// Statement nesting deeper than this is not searched for bindings.
const MAX_STATEMENT_DEPTH: usize = 256;

/// Calls that return their receiver's value for our purposes.
const TRANSPARENT_METHODS: &[&str] = &["freeze", "dup", "compact", "to_h"];

pub struct RubyAdapter {
    language: Language,
}

impl RubyAdapter {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_ruby::LANGUAGE.into(),
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

    fn bindings(&self, parsed: &ParsedFile) -> Vec<Binding> {
        let lowering = Lowering { parsed };
        let mut collector = BindingCollector::default();
        lowering.collect_bindings(parsed.tree.root_node(), None, &mut collector, 0);

        let mut bindings = collector.bindings;
        for (name, (line, entries)) in collector.namespaces {
            bindings.push(Binding {
                name,
                value: Expr::Object(entries),
                line,
            });
        }
        bindings
    }
}

impl Default for RubyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarAdapter for RubyAdapter {
    fn language_id(&self) -> &'static str {
        "ruby"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["rb"]
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

#[derive(Default)]
struct BindingCollector {
    bindings: Vec<Binding>,
    /// Module or class name → (line, constants assigned in its body).
    namespaces: BTreeMap<String, (usize, Vec<Entry>)>,
}

struct Lowering<'a> {
    parsed: &'a ParsedFile,
}

impl<'a> Lowering<'a> {
    fn text(&self, node: Node) -> &'a str {
        self.parsed.node_text(node)
    }

    /// Constant assignments anywhere, plus local variables bound to hash
    /// literals so a properties argument passed by name can be followed.
    fn collect_bindings(
        &self,
        node: Node,
        namespace: Option<&'a str>,
        out: &mut BindingCollector,
        depth: usize,
    ) {
        if depth > MAX_STATEMENT_DEPTH {
            return;
        }

        let mut namespace = namespace;
        match node.kind() {
            "module" | "class" => {
                namespace = node
                    .child_by_field_name("name")
                    .map(|name| match name.kind() {
                        "scope_resolution" => name.child_by_field_name("name").unwrap_or(name),
                        _ => name,
                    })
                    .map(|name| self.text(name));
            }
            "assignment" => {
                if let (Some(left), Some(right)) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) {
                    self.assignment(left, right, namespace, out);
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.collect_bindings(child, namespace, out, depth + 1);
        }
    }

    fn assignment(
        &self,
        left: Node,
        right: Node,
        namespace: Option<&str>,
        out: &mut BindingCollector,
    ) {
        let name = self.text(left).to_string();
        let line = left.start_position().row + 1;
        match left.kind() {
            "constant" => {
                let value = self.expr(right, 0);
                if let Some(namespace) = namespace {
                    out.namespaces
                        .entry(namespace.to_string())
                        .or_insert_with(|| (line, Vec::new()))
                        .1
                        .push(Entry::Property {
                            key: name.clone(),
                            value: value.clone(),
                        });
                }
                out.bindings.push(Binding { name, value, line });
            }
            "identifier" => {
                let value = self.expr(right, 0);
                if value.as_object().is_some() {
                    out.bindings.push(Binding { name, value, line });
                }
            }
            _ => {}
        }
    }

    /// A call with an argument list. Argument-less calls are attribute reads
    /// and never tracking calls.
    fn call(&self, node: Node, depth: usize) -> Option<CallExpr> {
        let method = node.child_by_field_name("method")?;
        let arguments = node.child_by_field_name("arguments")?;
        let method = self.text(method);
        let callee = match node.child_by_field_name("receiver") {
            Some(receiver) => Expr::member(self.expr(receiver, depth + 1), method),
            None => Expr::Ident(method.to_string()),
        };

        let mut args = Vec::new();
        let mut cursor = arguments.walk();
        for arg in arguments.named_children(&mut cursor) {
            match arg.kind() {
                "comment" => {}
                "pair" => match self.pair(arg, depth) {
                    (Expr::String(key), value) => args.push(Arg::keyword(key, value)),
                    _ => args.push(Arg::positional(Expr::Dynamic)),
                },
                "splat_argument" | "hash_splat_argument" | "block_argument" => {
                    args.push(Arg::positional(Expr::Dynamic))
                }
                _ => args.push(Arg::positional(self.expr(arg, depth + 1))),
            }
        }

        Some(CallExpr { callee, args })
    }

    fn expr(&self, node: Node, depth: usize) -> Expr {
        if depth > MAX_EXPR_DEPTH {
            return Expr::Dynamic;
        }

        match node.kind() {
            "string" | "delimited_symbol" => self.string(node),
            "chained_string" => {
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
            "simple_symbol" => Expr::String(self.text(node).trim_start_matches(':').to_string()),
            "hash_key_symbol" => Expr::String(self.text(node).to_string()),
            "integer" | "float" | "rational" | "complex" => Expr::Number,
            "true" | "false" => Expr::Bool,
            "nil" => Expr::Null,
            "identifier" | "constant" | "instance_variable" | "class_variable"
            | "global_variable" | "self" => Expr::Ident(self.text(node).to_string()),
            "scope_resolution" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return Expr::Dynamic;
                };
                match node.child_by_field_name("scope") {
                    Some(scope) => Expr::member(self.expr(scope, depth + 1), self.text(name)),
                    None => Expr::Ident(self.text(name).to_string()),
                }
            }
            "call" => {
                if let Some(call) = self.call(node, depth) {
                    return Expr::Call(Box::new(call));
                }
                let (Some(receiver), Some(method)) = (
                    node.child_by_field_name("receiver"),
                    node.child_by_field_name("method"),
                ) else {
                    return Expr::Dynamic;
                };
                let method = self.text(method);
                if TRANSPARENT_METHODS.contains(&method) {
                    self.expr(receiver, depth + 1)
                } else {
                    Expr::member(self.expr(receiver, depth + 1), method)
                }
            }
            "hash" => Expr::Object(self.entries(node, depth)),
            "array" | "string_array" | "symbol_array" => {
                let mut cursor = node.walk();
                let items = node
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment")
                    .map(|n| match n.kind() {
                        "splat_argument" => Expr::Dynamic,
                        "bare_string" | "bare_symbol" => self.string(n),
                        _ => self.expr(n, depth + 1),
                    })
                    .collect();
                Expr::Array(items)
            }
            "parenthesized_statements" => {
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .find(|n| n.kind() != "comment");
                match inner {
                    Some(inner) => self.expr(inner, depth + 1),
                    None => Expr::Dynamic,
                }
            }
            "unary" => {
                let operator = node
                    .child_by_field_name("operator")
                    .map(|op| self.text(op))
                    .unwrap_or("");
                match operator {
                    "!" | "not" => Expr::Bool,
                    "-" | "+" => match node.child_by_field_name("operand") {
                        Some(operand) if matches!(operand.kind(), "integer" | "float") => {
                            Expr::Number
                        }
                        _ => Expr::Dynamic,
                    },
                    _ => Expr::Dynamic,
                }
            }
            _ => Expr::Dynamic,
        }
    }

    /// Literal text of a string-like node, or `Interpolated` when it embeds
    /// `#{...}`.
    fn string(&self, node: Node) -> Expr {
        let mut text = String::new();
        let mut cursor = node.walk();
        for part in node.named_children(&mut cursor) {
            match part.kind() {
                "interpolation" => return Expr::Interpolated,
                "escape_sequence" => text.push_str(&unescape(self.text(part))),
                _ => text.push_str(self.text(part)),
            }
        }
        Expr::String(text)
    }

    /// Key and value of a `pair`. Shorthand `{name:}` reads the local of the
    /// same name.
    fn pair(&self, pair: Node, depth: usize) -> (Expr, Expr) {
        let Some(key) = pair.child_by_field_name("key") else {
            return (Expr::Dynamic, Expr::Dynamic);
        };
        let key = self.expr(key, depth + 1);
        let value = match (pair.child_by_field_name("value"), &key) {
            (Some(value), _) => self.expr(value, depth + 1),
            (None, Expr::String(name)) => Expr::Ident(name.clone()),
            (None, _) => Expr::Dynamic,
        };
        (key, value)
    }

    fn entries(&self, node: Node, depth: usize) -> Vec<Entry> {
        let mut entries = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "pair" => match self.pair(child, depth) {
                    (Expr::String(key), value) => entries.push(Entry::Property { key, value }),
                    (key, value) => entries.push(Entry::Computed { key, value }),
                },
                "hash_splat_argument" => {
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
            if matches!(ancestor.kind(), "method" | "singleton_method") {
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
            if matches!(
                parent.kind(),
                "program"
                    | "body_statement"
                    | "then"
                    | "else"
                    | "do"
                    | "block_body"
                    | "begin"
                    | "ensure"
                    | "method"
                    | "singleton_method"
                    | "class"
                    | "module"
            ) {
                break;
            }
            statement = parent;
        }

        // A comment right after `when x` or `do` sits before the clause body.
        let comment = statement.prev_sibling().or_else(|| {
            statement
                .parent()
                .filter(|p| matches!(p.kind(), "then" | "body_statement" | "block_body"))
                .and_then(|body| body.prev_sibling())
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

    fn lower_rb(source: &str) -> SyntaxFile {
        let adapter = RubyAdapter::new();
        let parsed = adapter
            .parse(Path::new("app.rb"), source.as_bytes(), None)
            .unwrap();
        adapter.lower(&parsed).unwrap()
    }

    #[test]
    fn test_bare_pairs_become_keywords() {
        let file = lower_rb(
            r#"
class OrdersController
  def create
    # Order placed by a customer
    Analytics.track(
      user_id: current_user.id,
      event: 'Order Placed',
      properties: { total: 12.5, coupon: nil, 'gift' => true, **extra }
    )
  end
end
"#,
        );
        let site = file
            .calls
            .iter()
            .find(|s| s.call.callee.path() == Some(vec!["Analytics", "track"]))
            .unwrap();
        assert_eq!(site.line, 5);
        assert_eq!(site.function, "create");
        assert_eq!(site.comment.as_deref(), Some("Order placed by a customer"));
        assert_eq!(
            site.call.keyword("event"),
            Some(&Expr::String("Order Placed".into()))
        );
        assert_eq!(
            site.call.keyword("user_id"),
            Some(&Expr::member(Expr::Ident("current_user".into()), "id"))
        );

        let properties = site.call.keyword("properties").and_then(Expr::as_object).unwrap();
        assert_eq!(Entry::value_of(properties, "total"), Some(&Expr::Number));
        assert_eq!(Entry::value_of(properties, "coupon"), Some(&Expr::Null));
        assert_eq!(Entry::value_of(properties, "gift"), Some(&Expr::Bool));
        assert!(matches!(properties[3], Entry::Spread(_)));
    }

    #[test]
    fn test_module_constants_and_local_hashes() {
        let file = lower_rb(
            r#"
SIGNUP = 'user_signup'

module TelemetryHelper
  FINISHED_SECTION = '_FinishedSection'.freeze
end

def send_event(kase)
  data = { foo: 'bar', label: "step #{kase.step}" }
  CustomModule.track(kase.id, TelemetryHelper::FINISHED_SECTION, data)
end
"#,
        );
        let names: Vec<&str> = file.bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["SIGNUP", "FINISHED_SECTION", "data", "TelemetryHelper"]
        );

        let helper = file.bindings[3].value.as_object().unwrap();
        assert_eq!(
            Entry::value_of(helper, "FINISHED_SECTION"),
            Some(&Expr::String("_FinishedSection".into()))
        );
        let data = file.bindings[2].value.as_object().unwrap();
        assert_eq!(Entry::value_of(data, "label"), Some(&Expr::Interpolated));

        let site = &file.calls[0];
        assert_eq!(site.function, "send_event");
        assert_eq!(
            site.call.positional(1),
            Some(&Expr::member(
                Expr::Ident("TelemetryHelper".into()),
                "FINISHED_SECTION"
            ))
        );
    }

    #[test]
    fn test_symbols_and_top_level_calls() {
        let file = lower_rb(
            "tracker.track_struct_event(category: :shop, action: 'add-to-basket', value: -2)\n",
        );
        assert_eq!(file.calls.len(), 1);
        let call = &file.calls[0].call;
        assert_eq!(file.calls[0].function, "global");
        assert_eq!(call.keyword("category"), Some(&Expr::String("shop".into())));
        assert_eq!(call.keyword("value"), Some(&Expr::Number));
    }

    #[test]
    fn test_syntax_error_is_rejected() {
        let adapter = RubyAdapter::new();
        let result = adapter.parse(Path::new("bad.rb"), b"def broken(\n  track(\n", None);
        assert!(matches!(result, Err(ParseError::Syntax { .. })));
    }
}
