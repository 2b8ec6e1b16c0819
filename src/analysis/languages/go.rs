//! Go grammar adapter using tree-sitter.
//!
//! Go SDKs take event data as struct literals (`analytics.Track{Event: ..}`),
//! which lower to calls with keyword arguments named after the fields. Map
//! literals lower to objects and slice literals to arrays.

use std::path::Path;
use std::time::Duration;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Query, QueryCursor};

use super::{clean_comment, strip_quotes, unescape, MAX_EXPR_DEPTH};
use crate::analysis::traits::parse_tree;
use crate::analysis::{
    Arg, Binding, CallExpr, CallSite, Entry, Expr, GrammarAdapter, ParsedFile, SyntaxFile,
};
use crate::error::ParseError;

const CALL_QUERY: &str = r#"
(call_expression) @call
"#;

const BINDING_QUERY: &str = r#"
[(const_spec) (var_spec)] @spec
(short_var_declaration) @short
"#;

/// Snowplow's pointer helpers, `sp.NewString("x")` and friends.
const POINTER_HELPERS: &[&str] = &["NewString", "NewInt64", "NewFloat64", "NewBool"];

pub struct GoAdapter {
    language: Language,
}

impl GoAdapter {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_go::LANGUAGE.into(),
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

    /// `const`, `var` and `:=` declarations anywhere in the file. Names
    /// reused across functions with different values drop out later.
    fn bindings(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Binding>> {
        let query = Query::new(&self.language, BINDING_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let lowering = Lowering { parsed };
        let mut bindings = Vec::new();
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                let (names, values) = match query.capture_names()[capture.index as usize] {
                    "spec" => {
                        let mut cursor = node.walk();
                        let names: Vec<Node> =
                            node.children_by_field_name("name", &mut cursor).collect();
                        (names, node.child_by_field_name("value"))
                    }
                    _ => {
                        let names = node
                            .child_by_field_name("left")
                            .map(|left| {
                                let mut cursor = left.walk();
                                left.named_children(&mut cursor).collect()
                            })
                            .unwrap_or_default();
                        (names, node.child_by_field_name("right"))
                    }
                };
                let Some(values) = values else {
                    continue;
                };

                let mut walker = values.walk();
                let values: Vec<Node> = values
                    .named_children(&mut walker)
                    .filter(|n| n.kind() != "comment")
                    .collect();
                if values.len() != names.len() {
                    continue;
                }
                for (name, value) in names.into_iter().zip(values) {
                    if name.kind() != "identifier" || lowering.text(name) == "_" {
                        continue;
                    }
                    bindings.push(Binding {
                        name: lowering.text(name).to_string(),
                        value: lowering.expr(value, 0),
                        line: name.start_position().row + 1,
                    });
                }
            }
        }
        Ok(bindings)
    }
}

impl Default for GoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarAdapter for GoAdapter {
    fn language_id(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["go"]
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
            bindings: self.bindings(parsed)?,
        })
    }
}

/// Which literal a composite literal's body should become.
#[derive(Clone, Copy)]
enum Shape {
    Map,
    List,
    Struct,
}

struct Lowering<'a> {
    parsed: &'a ParsedFile,
}

impl<'a> Lowering<'a> {
    fn text(&self, node: Node) -> &'a str {
        self.parsed.node_text(node)
    }

    fn call(&self, node: Node, depth: usize) -> Option<CallExpr> {
        let function = node.child_by_field_name("function")?;
        let arguments = node.child_by_field_name("arguments")?;

        let mut args = Vec::new();
        let mut cursor = arguments.walk();
        for arg in arguments.named_children(&mut cursor) {
            match arg.kind() {
                "comment" => {}
                "variadic_argument" => args.push(Arg::positional(Expr::Dynamic)),
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
            "interpreted_string_literal" => Expr::String(unescape(strip_quotes(self.text(node)))),
            "raw_string_literal" => Expr::String(strip_quotes(self.text(node)).to_string()),
            "int_literal" | "float_literal" | "imaginary_literal" | "rune_literal" | "iota" => {
                Expr::Number
            }
            "true" | "false" => Expr::Bool,
            "nil" => Expr::Null,
            "identifier" | "type_identifier" | "package_identifier" | "field_identifier" => {
                Expr::Ident(self.text(node).to_string())
            }
            "selector_expression" => match (
                node.child_by_field_name("operand"),
                node.child_by_field_name("field"),
            ) {
                (Some(operand), Some(field)) => {
                    Expr::member(self.expr(operand, depth + 1), self.text(field))
                }
                _ => Expr::Dynamic,
            },
            "qualified_type" => match (
                node.child_by_field_name("package"),
                node.child_by_field_name("name"),
            ) {
                (Some(package), Some(name)) => {
                    Expr::member(Expr::Ident(self.text(package).to_string()), self.text(name))
                }
                _ => Expr::Dynamic,
            },
            "call_expression" => match self.call(node, depth) {
                Some(call) => fold_call(call),
                None => Expr::Dynamic,
            },
            "composite_literal" => self.composite(node, depth),
            "literal_value" => self.literal_body(node, self.guess_shape(node), depth),
            "literal_element" | "parenthesized_expression" => match first_named(node) {
                Some(inner) => self.expr(inner, depth + 1),
                None => Expr::Dynamic,
            },
            "unary_expression" => {
                let operator = node
                    .child_by_field_name("operator")
                    .map(|op| self.text(op))
                    .unwrap_or("");
                let Some(operand) = node.child_by_field_name("operand") else {
                    return Expr::Dynamic;
                };
                match operator {
                    "&" => self.expr(operand, depth + 1),
                    "!" => Expr::Bool,
                    "-" | "+" => match self.expr(operand, depth + 1) {
                        Expr::Number => Expr::Number,
                        _ => Expr::Dynamic,
                    },
                    _ => Expr::Dynamic,
                }
            }
            _ => Expr::Dynamic,
        }
    }

    /// `T{...}`: maps become objects, slices arrays, and anything else a
    /// call to the type with one keyword argument per field.
    fn composite(&self, node: Node, depth: usize) -> Expr {
        let (Some(ty), Some(body)) = (
            node.child_by_field_name("type"),
            node.child_by_field_name("body"),
        ) else {
            return Expr::Dynamic;
        };
        let ty = match ty.kind() {
            "generic_type" => ty.child_by_field_name("type").unwrap_or(ty),
            _ => ty,
        };

        match ty.kind() {
            "map_type" => self.literal_body(body, Shape::Map, depth),
            "slice_type" | "array_type" | "implicit_length_array_type" => {
                self.literal_body(body, Shape::List, depth)
            }
            _ => match self.literal_body(body, Shape::Struct, depth) {
                Expr::Call(mut call) => {
                    call.callee = self.expr(ty, depth + 1);
                    Expr::Call(call)
                }
                other => other,
            },
        }
    }

    /// A `{...}` without a type of its own takes its shape from its keys.
    fn guess_shape(&self, body: Node) -> Shape {
        let mut cursor = body.walk();
        let keyed = body
            .named_children(&mut cursor)
            .any(|n| n.kind() == "keyed_element");
        if keyed {
            Shape::Map
        } else {
            Shape::List
        }
    }

    fn literal_body(&self, body: Node, shape: Shape, depth: usize) -> Expr {
        let mut entries = Vec::new();
        let mut items = Vec::new();
        let mut args = Vec::new();

        let mut cursor = body.walk();
        for element in body.named_children(&mut cursor) {
            match element.kind() {
                "comment" => {}
                "keyed_element" => {
                    let mut inner = element.walk();
                    let parts: Vec<Node> = element
                        .named_children(&mut inner)
                        .filter(|n| n.kind() != "comment")
                        .map(unwrap_element)
                        .collect();
                    let &[key, value] = parts.as_slice() else {
                        continue;
                    };
                    let value = self.expr(value, depth + 1);
                    match shape {
                        Shape::Struct => args.push(Arg::keyword(self.text(key), value)),
                        _ => match self.expr(key, depth + 1) {
                            Expr::String(key) => entries.push(Entry::Property { key, value }),
                            key => entries.push(Entry::Computed { key, value }),
                        },
                    }
                }
                _ => {
                    let value = self.expr(unwrap_element(element), depth + 1);
                    match shape {
                        Shape::Struct => args.push(Arg::positional(value)),
                        _ => items.push(value),
                    }
                }
            }
        }

        match shape {
            Shape::Map => Expr::Object(entries),
            Shape::List => Expr::Array(items),
            Shape::Struct => Expr::Call(Box::new(CallExpr {
                callee: Expr::Dynamic,
                args,
            })),
        }
    }

    fn enclosing_function(&self, node: Node) -> String {
        let mut current = node.parent();
        while let Some(ancestor) = current {
            if matches!(ancestor.kind(), "function_declaration" | "method_declaration") {
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
                "source_file"
                    | "block"
                    | "statement_list"
                    | "expression_case"
                    | "default_case"
                    | "communication_case"
                    | "type_case"
            ) {
                break;
            }
            statement = parent;
        }

        let comment = statement.prev_sibling().or_else(|| {
            statement
                .parent()
                .filter(|p| p.kind() == "statement_list")
                .and_then(|list| list.prev_sibling())
        })?;
        if comment.kind() != "comment"
            || comment.end_position().row + 1 != statement.start_position().row
        {
            return None;
        }
        clean_comment(self.text(comment))
    }
}

fn first_named(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let first = node
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment");
    first
}

/// Newer grammars wrap each element of a literal in `literal_element`.
fn unwrap_element(node: Node) -> Node {
    match node.kind() {
        "literal_element" => first_named(node).unwrap_or(node),
        _ => node,
    }
}

/// Fold property builders into object literals:
/// `NewProperties().Set("plan", p)` becomes `{plan: p}`, and pointer helpers
/// like `sp.NewString(x)` become `x`.
fn fold_call(call: CallExpr) -> Expr {
    match call.callee.last_segment() {
        Some("NewProperties") if call.args.is_empty() => Expr::Object(Vec::new()),
        Some(helper) if POINTER_HELPERS.contains(&helper) && call.args.len() == 1 => call
            .args
            .into_iter()
            .next()
            .map(|arg| arg.value)
            .unwrap_or(Expr::Dynamic),
        Some("Set") => set_property(&call).unwrap_or_else(|| Expr::Call(Box::new(call))),
        _ => Expr::Call(Box::new(call)),
    }
}

fn set_property(call: &CallExpr) -> Option<Expr> {
    let Expr::Member { object, .. } = &call.callee else {
        return None;
    };
    let mut entries = object.as_object()?.to_vec();
    let Expr::String(key) = call.positional(0)? else {
        return None;
    };
    entries.push(Entry::Property {
        key: key.clone(),
        value: call.positional(1)?.clone(),
    });
    Some(Expr::Object(entries))
}
