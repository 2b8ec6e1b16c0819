//! Language-agnostic syntax model produced by grammar adapters.
//!
//! Adapters lower their tree-sitter trees into these owned structures so the
//! detection pipeline never touches grammar-specific node kinds. Nothing here
//! borrows from the parse tree; a `SyntaxFile` outlives its `ParsedFile`.

/// An expression in literal-value position.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A string literal with no interpolation.
    String(String),
    /// A template or f-string containing interpolations.
    Interpolated,
    Number,
    Bool,
    /// `null`, `undefined` or `None`.
    Null,
    Ident(String),
    /// `this` in JavaScript. Python's `self` stays an identifier.
    This,
    Member {
        object: Box<Expr>,
        property: String,
    },
    Call(Box<CallExpr>),
    Object(Vec<Entry>),
    Array(Vec<Expr>),
    /// Anything the adapter cannot express statically.
    Dynamic,
}

impl Expr {
    /// Build a member access expression.
    pub fn member(object: Expr, property: impl Into<String>) -> Self {
        Expr::Member {
            object: Box::new(object),
            property: property.into(),
        }
    }

    /// The dotted path of an identifier or member chain, e.g.
    /// `this.props.track` becomes `["this", "props", "track"]`.
    ///
    /// Returns `None` when any link in the chain is not a plain name.
    pub fn path(&self) -> Option<Vec<&str>> {
        match self {
            Expr::Ident(name) => Some(vec![name.as_str()]),
            Expr::This => Some(vec!["this"]),
            Expr::Member { object, property } => {
                let mut path = object.path()?;
                path.push(property.as_str());
                Some(path)
            }
            _ => None,
        }
    }

    /// The final segment of an identifier or member chain.
    pub fn last_segment(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            Expr::This => Some("this"),
            Expr::Member { property, .. } => Some(property),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&CallExpr> {
        match self {
            Expr::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[Entry]> {
        match self {
            Expr::Object(entries) => Some(entries.as_slice()),
            _ => None,
        }
    }
}

/// One member of an object or dictionary literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A statically named key.
    Property { key: String, value: Expr },
    /// A computed key such as `[EVENTS.KEY]: value`.
    Computed { key: Expr, value: Expr },
    /// `...expr` or `**expr`.
    Spread(Expr),
}

impl Entry {
    /// The value stored under a statically named key.
    pub fn value_of<'a>(entries: &'a [Entry], key: &str) -> Option<&'a Expr> {
        // Later duplicates win, matching literal evaluation order.
        entries.iter().rev().find_map(|e| match e {
            Entry::Property { key: k, value } if k == key => Some(value),
            _ => None,
        })
    }
}

/// A call argument. Keyword arguments only occur in Python.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub keyword: Option<String>,
    pub value: Expr,
}

impl Arg {
    pub fn positional(value: Expr) -> Self {
        Self {
            keyword: None,
            value,
        }
    }

    pub fn keyword(name: impl Into<String>, value: Expr) -> Self {
        Self {
            keyword: Some(name.into()),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Expr,
    pub args: Vec<Arg>,
}

impl CallExpr {
    /// The `index`-th positional argument.
    pub fn positional(&self, index: usize) -> Option<&Expr> {
        self.args
            .iter()
            .filter(|a| a.keyword.is_none())
            .nth(index)
            .map(|a| &a.value)
    }

    /// The argument passed under keyword `name`.
    pub fn keyword(&self, name: &str) -> Option<&Expr> {
        self.args
            .iter()
            .find(|a| a.keyword.as_deref() == Some(name))
            .map(|a| &a.value)
    }

    /// All keyword arguments except those named in `skip`, as object entries.
    pub fn keywords_except(&self, skip: &[&str]) -> Vec<Entry> {
        self.args
            .iter()
            .filter_map(|a| match &a.keyword {
                Some(k) if !skip.contains(&k.as_str()) => Some(Entry::Property {
                    key: k.clone(),
                    value: a.value.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// A call expression found in a file, with its location context.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub call: CallExpr,
    /// 1-based line of the call expression.
    pub line: usize,
    /// Name of the enclosing function, or `global` at module level.
    pub function: String,
    /// Text of a comment on the line directly above the call's statement.
    pub comment: Option<String>,
}

/// A constant-like binding: `const X = ...`, a TS enum, or a Python
/// module/class level assignment. Classes and enums lower to `Expr::Object`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: Expr,
    pub line: usize,
}

/// Everything the detection pipeline needs to know about one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxFile {
    pub path: String,
    pub language: &'static str,
    /// Call sites in source order.
    pub calls: Vec<CallSite>,
    pub bindings: Vec<Binding>,
}
