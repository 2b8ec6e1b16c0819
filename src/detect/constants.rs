//! Per-file constant resolution.
//!
//! Event names are often written as `EVENTS.SIGNUP` or `SIGNUP_EVENT` rather
//! than literals. The table built here maps such names back to strings using
//! only the declarations in the same file.

use std::collections::{BTreeMap, HashMap};

use crate::analysis::{Binding, Entry, Expr, SyntaxFile};

/// A literal value a constant can stand for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstValue {
    Str(String),
    /// A frozen object or enum of string members.
    Map(BTreeMap<String, String>),
}

/// Name → literal value for one file.
///
/// Only ever holds literal values. A name declared more than once with
/// different values is absent, as is any name whose initializer is not a
/// literal.
#[derive(Debug, Default, Clone)]
pub struct ConstantTable {
    entries: HashMap<String, ConstValue>,
}

impl ConstantTable {
    /// Build the table from a file's bindings.
    pub fn build(bindings: &[Binding]) -> Self {
        Self {
            entries: unambiguous(bindings, literal_value),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ConstValue> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve an expression in literal-value position to a string.
    ///
    /// Handles string literals, `NAME` and `MAP.KEY`. Anything else is
    /// unresolved.
    pub fn resolve_str(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::String(s) => Some(s.clone()),
            Expr::Ident(name) => match self.entries.get(name)? {
                ConstValue::Str(s) => Some(s.clone()),
                ConstValue::Map(_) => None,
            },
            Expr::Member { object, property } => {
                let Expr::Ident(name) = object.as_ref() else {
                    return None;
                };
                match self.entries.get(name)? {
                    ConstValue::Map(map) => map.get(property).cloned(),
                    ConstValue::Str(_) => None,
                }
            }
            _ => None,
        }
    }
}

/// Name → object literal for one file, used to follow a properties argument
/// passed by name (`track("x", payload)`).
#[derive(Debug, Default, Clone)]
pub struct ObjectBindings {
    entries: HashMap<String, Vec<Entry>>,
}

impl ObjectBindings {
    pub fn build(bindings: &[Binding]) -> Self {
        Self {
            entries: unambiguous(bindings, |value| {
                object_literal(value).map(|entries| entries.to_vec())
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[Entry]> {
        self.entries.get(name).map(Vec::as_slice)
    }
}

/// Everything resolvable by name within one file.
#[derive(Debug, Default, Clone)]
pub struct FileScope {
    pub constants: ConstantTable,
    pub objects: ObjectBindings,
}

impl FileScope {
    pub fn build(file: &SyntaxFile) -> Self {
        Self {
            constants: ConstantTable::build(&file.bindings),
            objects: ObjectBindings::build(&file.bindings),
        }
    }
}

/// Collect `extract(value)` per binding name, dropping names bound more than
/// once to different (or non-extractable) values.
fn unambiguous<T, F>(bindings: &[Binding], extract: F) -> HashMap<String, T>
where
    T: PartialEq,
    F: Fn(&Expr) -> Option<T>,
{
    let mut seen: HashMap<String, Option<T>> = HashMap::new();
    for binding in bindings {
        let value = extract(&binding.value);
        match seen.get_mut(&binding.name) {
            None => {
                seen.insert(binding.name.clone(), value);
            }
            Some(existing) => {
                if *existing != value {
                    *existing = None;
                }
            }
        }
    }
    seen.into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
}

fn literal_value(value: &Expr) -> Option<ConstValue> {
    if let Expr::String(s) = value {
        return Some(ConstValue::Str(s.clone()));
    }

    let entries = object_literal(value)?;
    let map: BTreeMap<String, String> = entries
        .iter()
        .filter_map(|entry| match entry {
            Entry::Property {
                key,
                value: Expr::String(s),
            } => Some((key.clone(), s.clone())),
            _ => None,
        })
        .collect();

    if map.is_empty() {
        None
    } else {
        Some(ConstValue::Map(map))
    }
}

/// The object literal behind a binding, looking through `Object.freeze(...)`.
fn object_literal(value: &Expr) -> Option<&[Entry]> {
    match value {
        Expr::Object(entries) => Some(entries.as_slice()),
        Expr::Call(call) if is_freeze(&call.callee) => object_literal(call.positional(0)?),
        _ => None,
    }
}

fn is_freeze(callee: &Expr) -> bool {
    callee.path().as_deref() == Some(&["Object", "freeze"][..])
}
