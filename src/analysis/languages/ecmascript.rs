//! Lowering shared by the JavaScript and TypeScript adapters.
//!
//! The TypeScript grammar extends the JavaScript one, so both trees use the
//! same node kinds for everything the syntax model cares about. TypeScript-only
//! wrappers (`as`, `satisfies`, `!`, `<T>x`) are unwrapped here too.

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Query, QueryCursor};

use super::{clean_comment, strip_quotes, unescape, MAX_EXPR_DEPTH};
use crate::analysis::{Arg, Binding, CallExpr, CallSite, Entry, Expr, ParsedFile, SyntaxFile};

const CALL_QUERY: &str = r#"
(call_expression) @call
"#;

/// `const` declarations with an initializer.
const CONST_QUERY: &str = r#"
(lexical_declaration
  (variable_declarator
    name: (identifier) @name
    value: (_) @value)
) @decl
"#;

/// TypeScript enums; not valid against the JavaScript grammar.
const ENUM_QUERY: &str = r#"
(enum_declaration
  name: (identifier) @enum_name
  body: (enum_body) @enum_body
) @enum
"#;

/// React hooks whose callbacks are reported as `Component.hook`.
const REACT_HOOKS: &[&str] = &[
    "useEffect",
    "useLayoutEffect",
    "useInsertionEffect",
    "useCallback",
    "useMemo",
    "useReducer",
    "useState",
    "useImperativeHandle",
    "useDeferredValue",
    "useTransition",
];

const FUNCTION_KINDS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

/// Lower a JavaScript-family parse tree.
pub(super) fn lower(
    language: &Language,
    parsed: &ParsedFile,
    language_id: &'static str,
    with_enums: bool,
) -> anyhow::Result<SyntaxFile> {
    let lowering = Lowering { parsed };

    let calls = lowering.call_sites(language)?;
    let mut bindings = lowering.const_bindings(language)?;
    if with_enums {
        bindings.extend(lowering.enum_bindings(language)?);
    }
    bindings.sort_by_key(|b| b.line);

    Ok(SyntaxFile {
        path: parsed.path.clone(),
        language: language_id,
        calls,
        bindings,
    })
}

struct Lowering<'a> {
    parsed: &'a ParsedFile,
}

impl<'a> Lowering<'a> {
    fn text(&self, node: Node) -> &'a str {
        self.parsed.node_text(node)
    }

    fn call_sites(&self, language: &Language) -> anyhow::Result<Vec<CallSite>> {
        let query = Query::new(language, CALL_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.parsed.tree.root_node(), &self.parsed.source[..]);

        let mut sites = Vec::new();
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                let Some(call) = self.call(node, 0) else {
                    continue;
                };
                sites.push(CallSite {
                    call,
                    line: node.start_position().row + 1,
                    function: self.enclosing_function(node),
                    comment: self.leading_comment(node),
                });
            }
        }
        Ok(sites)
    }

    fn const_bindings(&self, language: &Language) -> anyhow::Result<Vec<Binding>> {
        let query = Query::new(language, CONST_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.parsed.tree.root_node(), &self.parsed.source[..]);

        let mut bindings = Vec::new();
        while let Some(m) = matches.next() {
            let mut name = None;
            let mut value = None;
            let mut is_const = false;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "name" => name = Some(capture.node),
                    "value" => value = Some(capture.node),
                    "decl" => {
                        is_const = capture
                            .node
                            .child(0)
                            .map(|kw| kw.kind() == "const")
                            .unwrap_or(false);
                    }
                    _ => {}
                }
            }

            if let (true, Some(name), Some(value)) = (is_const, name, value) {
                bindings.push(Binding {
                    name: self.text(name).to_string(),
                    value: self.expr(value, 0),
                    line: name.start_position().row + 1,
                });
            }
        }
        Ok(bindings)
    }

    fn enum_bindings(&self, language: &Language) -> anyhow::Result<Vec<Binding>> {
        let query = Query::new(language, ENUM_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.parsed.tree.root_node(), &self.parsed.source[..]);

        let mut bindings = Vec::new();
        while let Some(m) = matches.next() {
            let mut name = None;
            let mut body = None;
            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "enum_name" => name = Some(capture.node),
                    "enum_body" => body = Some(capture.node),
                    _ => {}
                }
            }
            let (Some(name), Some(body)) = (name, body) else {
                continue;
            };

            let mut entries = Vec::new();
            let mut cursor = body.walk();
            for member in body.named_children(&mut cursor) {
                if member.kind() != "enum_assignment" {
                    continue;
                }
                let (Some(key), Some(value)) = (
                    member.child_by_field_name("name"),
                    member.child_by_field_name("value"),
                ) else {
                    continue;
                };
                entries.push(Entry::Property {
                    key: self.property_key(key),
                    value: self.expr(value, 0),
                });
            }

            bindings.push(Binding {
                name: self.text(name).to_string(),
                value: Expr::Object(entries),
                line: name.start_position().row + 1,
            });
        }
        Ok(bindings)
    }

    fn call(&self, node: Node, depth: usize) -> Option<CallExpr> {
        let function = node.child_by_field_name("function")?;
        let arguments = node.child_by_field_name("arguments")?;
        // Tagged templates carry a template string instead of an argument list.
        if arguments.kind() != "arguments" {
            return None;
        }

        let mut args = Vec::new();
        let mut cursor = arguments.walk();
        for arg in arguments.named_children(&mut cursor) {
            match arg.kind() {
                "comment" => {}
                "spread_element" => args.push(Arg::positional(Expr::Dynamic)),
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
            "string" => Expr::String(unescape(strip_quotes(self.text(node)))),
            "template_string" => self.template(node),
            "number" => Expr::Number,
            "true" | "false" => Expr::Bool,
            "null" | "undefined" => Expr::Null,
            "identifier" => Expr::Ident(self.text(node).to_string()),
            "this" => Expr::This,
            "member_expression" => {
                match (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("property"),
                ) {
                    (Some(object), Some(property)) => {
                        Expr::member(self.expr(object, depth + 1), self.text(property))
                    }
                    _ => Expr::Dynamic,
                }
            }
            "subscript_expression" => {
                match (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("index"),
                ) {
                    (Some(object), Some(index)) if index.kind() == "string" => Expr::member(
                        self.expr(object, depth + 1),
                        unescape(strip_quotes(self.text(index))),
                    ),
                    _ => Expr::Dynamic,
                }
            }
            "call_expression" => match self.call(node, depth) {
                Some(call) => Expr::Call(Box::new(call)),
                None => Expr::Dynamic,
            },
            "object" => Expr::Object(self.entries(node, depth)),
            "array" => {
                let mut cursor = node.walk();
                let items = node
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment")
                    .map(|n| match n.kind() {
                        "spread_element" => Expr::Dynamic,
                        _ => self.expr(n, depth + 1),
                    })
                    .collect();
                Expr::Array(items)
            }
            "parenthesized_expression" | "as_expression" | "satisfies_expression"
            | "non_null_expression" => match first_expression(node) {
                Some(inner) => self.expr(inner, depth + 1),
                None => Expr::Dynamic,
            },
            "type_assertion" => {
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() != "type_arguments" && n.kind() != "comment")
                    .last();
                match inner {
                    Some(inner) => self.expr(inner, depth + 1),
                    None => Expr::Dynamic,
                }
            }
            "unary_expression" => {
                let operator = node.child_by_field_name("operator").map(|o| self.text(o));
                let argument = node.child_by_field_name("argument");
                match (operator, argument) {
                    (Some("-" | "+"), Some(arg)) if arg.kind() == "number" => Expr::Number,
                    (Some("!"), _) => Expr::Bool,
                    _ => Expr::Dynamic,
                }
            }
            _ => Expr::Dynamic,
        }
    }

    fn template(&self, node: Node) -> Expr {
        let mut cursor = node.walk();
        let interpolated = node
            .named_children(&mut cursor)
            .any(|n| n.kind() == "template_substitution");
        if interpolated {
            Expr::Interpolated
        } else {
            Expr::String(unescape(strip_quotes(self.text(node))))
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
                    if key.kind() == "computed_property_name" {
                        let key = match first_expression(key) {
                            Some(inner) => self.expr(inner, depth + 1),
                            None => Expr::Dynamic,
                        };
                        entries.push(Entry::Computed { key, value });
                    } else {
                        entries.push(Entry::Property {
                            key: self.property_key(key),
                            value,
                        });
                    }
                }
                "shorthand_property_identifier" => {
                    let name = self.text(child).to_string();
                    entries.push(Entry::Property {
                        key: name.clone(),
                        value: Expr::Ident(name),
                    });
                }
                "spread_element" => {
                    let source = match first_expression(child) {
                        Some(inner) => self.expr(inner, depth + 1),
                        None => Expr::Dynamic,
                    };
                    entries.push(Entry::Spread(source));
                }
                "method_definition" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        entries.push(Entry::Property {
                            key: self.property_key(name),
                            value: Expr::Dynamic,
                        });
                    }
                }
                _ => {}
            }
        }
        entries
    }

    fn property_key(&self, key: Node) -> String {
        match key.kind() {
            "string" => unescape(strip_quotes(self.text(key))),
            _ => self.text(key).to_string(),
        }
    }

    /// Name of the function enclosing `node`, following the naming rules for
    /// declarations, methods, object members and React hook callbacks.
    fn enclosing_function(&self, node: Node) -> String {
        let mut hook: Option<&str> = None;
        let mut component: Option<String> = None;

        let mut current = node.parent();
        while let Some(ancestor) = current {
            if hook.is_none() && ancestor.kind() == "call_expression" {
                hook = ancestor
                    .child_by_field_name("function")
                    .and_then(|f| match f.kind() {
                        "identifier" => Some(self.text(f)),
                        "member_expression" => {
                            f.child_by_field_name("property").map(|p| self.text(p))
                        }
                        _ => None,
                    })
                    .filter(|name| REACT_HOOKS.contains(name));
            }

            if let Some(name) = self.function_name(ancestor) {
                component = Some(name);
                break;
            }
            current = ancestor.parent();
        }

        match (component, hook) {
            (Some(component), Some(hook)) => format!("{}.{}", component, hook),
            (None, Some(hook)) => hook.to_string(),
            (Some(component), None) => component,
            (None, None) => "global".to_string(),
        }
    }

    fn function_name(&self, node: Node) -> Option<String> {
        let is_function_value = |field: &str| {
            node.child_by_field_name(field)
                .map(|v| FUNCTION_KINDS.contains(&v.kind()))
                .unwrap_or(false)
        };

        match node.kind() {
            "function_declaration" | "generator_function_declaration" => Some(
                node.child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_else(|| "anonymous".to_string()),
            ),
            "method_definition" => node
                .child_by_field_name("name")
                .map(|n| self.property_key(n)),
            "variable_declarator" if is_function_value("value") => node
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string()),
            "pair" if is_function_value("value") => node
                .child_by_field_name("key")
                .map(|n| self.property_key(n)),
            "field_definition" | "public_field_definition" if is_function_value("value") => {
                node.child_by_field_name("property")
                    .or_else(|| node.child_by_field_name("name"))
                    .map(|n| self.property_key(n))
            }
            _ => None,
        }
    }

    /// Comment on the line directly above the statement containing `node`.
    fn leading_comment(&self, node: Node) -> Option<String> {
        let mut statement = node;
        while let Some(parent) = statement.parent() {
            if matches!(
                parent.kind(),
                "program" | "statement_block" | "class_body" | "switch_case" | "switch_default"
            ) {
                break;
            }
            statement = parent;
        }

        let comment = statement.prev_sibling()?;
        if comment.kind() != "comment"
            || comment.end_position().row + 1 != statement.start_position().row
        {
            return None;
        }
        clean_comment(self.text(comment))
    }
}

fn first_expression(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment");
    found
}
