//! Property schema inference from literal payloads.

use crate::analysis::{Entry, Expr};
use crate::schema::{Property, PropertySchema, PropertyType};

use super::constants::FileScope;
use super::types::{Issue, IssueKind};

/// Following `const payload = {...}` through nested identifiers stops here.
const MAX_BINDING_DEPTH: usize = 8;

/// Infers property schemas for one call site.
///
/// Spreads contribute no keys; each one is recorded as an
/// `unresolved_spread` issue against the call site.
pub struct PropertyExtractor<'a> {
    scope: &'a FileScope,
    file: &'a str,
    line: usize,
    issues: Vec<Issue>,
}

impl<'a> PropertyExtractor<'a> {
    pub fn new(scope: &'a FileScope, file: &'a str, line: usize) -> Self {
        Self {
            scope,
            file,
            line,
            issues: Vec::new(),
        }
    }

    /// Schema of an object literal's entries. Later duplicate keys win.
    pub fn extract(&mut self, entries: &[Entry]) -> PropertySchema {
        self.extract_at(entries, 0)
    }

    /// Schema of a properties argument: an object literal, or a name bound to
    /// one in the same file. Anything else yields no properties.
    pub fn extract_payload(&mut self, payload: &Expr) -> PropertySchema {
        match self.object_entries(payload, 0) {
            Some(entries) => self.extract_at(entries, 1),
            None => PropertySchema::new(),
        }
    }

    /// Shape of a single value.
    pub fn infer(&mut self, value: &Expr) -> Property {
        self.infer_at(value, 0)
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    fn extract_at(&mut self, entries: &[Entry], depth: usize) -> PropertySchema {
        let mut schema = PropertySchema::new();
        for entry in entries {
            match entry {
                Entry::Property { key, value } => {
                    let property = self.infer_at(value, depth);
                    schema.insert(key.clone(), property);
                }
                Entry::Computed { key, value } => {
                    if let Some(key) = self.scope.constants.resolve_str(key) {
                        let property = self.infer_at(value, depth);
                        schema.insert(key, property);
                    }
                }
                Entry::Spread(source) => {
                    let source = source
                        .path()
                        .map(|p| format!("`{}`", p.join(".")))
                        .unwrap_or_else(|| "an expression".to_string());
                    self.issues.push(
                        Issue::new(
                            IssueKind::UnresolvedSpread,
                            format!("spread of {} contributes no known properties", source),
                        )
                        .in_file(self.file)
                        .at_line(self.line),
                    );
                }
            }
        }
        schema
    }

    fn infer_at(&mut self, value: &Expr, depth: usize) -> Property {
        match value {
            Expr::String(_) | Expr::Interpolated => Property::of(PropertyType::String),
            Expr::Number => Property::of(PropertyType::Number),
            Expr::Bool => Property::of(PropertyType::Boolean),
            Expr::Null => Property::of(PropertyType::Null),
            Expr::Object(entries) => Property::object(self.extract_at(entries, depth + 1)),
            Expr::Array(items) => Property::array(self.item_schema(items, depth + 1)),
            Expr::Ident(_) | Expr::Member { .. } => {
                if self.scope.constants.resolve_str(value).is_some() {
                    return Property::of(PropertyType::String);
                }
                match self.object_entries(value, depth) {
                    Some(entries) => Property::object(self.extract_at(entries, depth + 1)),
                    None => Property::any(),
                }
            }
            Expr::This | Expr::Call(_) | Expr::Dynamic => Property::any(),
        }
    }

    /// Element shape of an array literal: the common type of its elements,
    /// with object elements unioned, or `any` when empty or mixed.
    fn item_schema(&mut self, items: &[Expr], depth: usize) -> Property {
        let mut inferred = items.iter().map(|item| self.infer_at(item, depth));
        let Some(mut first) = inferred.next() else {
            return Property::any();
        };

        for item in inferred.collect::<Vec<_>>() {
            if item.kind != first.kind {
                return Property::any();
            }
            // Conflicts inside a single literal are not worth reporting.
            let mut ignored = Vec::new();
            merge_property(&mut first, &item, "", &mut ignored);
        }
        first
    }

    fn object_entries<'v>(&self, value: &'v Expr, depth: usize) -> Option<&'v [Entry]>
    where
        'a: 'v,
    {
        match value {
            Expr::Object(entries) => Some(entries.as_slice()),
            Expr::Ident(name) if depth < MAX_BINDING_DEPTH => self.scope.objects.get(name),
            _ => None,
        }
    }
}

/// A property whose type differed between two detections of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeConflict {
    /// Dotted path of the property, `[]` marking array items.
    pub path: String,
    pub kept: PropertyType,
    pub ignored: PropertyType,
}

/// Union `incoming` into `existing`.
///
/// Keys from both sides survive. When a key's types differ, the existing
/// (first-seen) type wins and the clash is appended to `conflicts`. `any`
/// carries no information: it never conflicts and is refined by a concrete
/// type.
pub fn merge_schema(
    existing: &mut PropertySchema,
    incoming: &PropertySchema,
    prefix: &str,
    conflicts: &mut Vec<TypeConflict>,
) {
    for (key, property) in incoming {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match existing.get_mut(key) {
            Some(current) => merge_property(current, property, &path, conflicts),
            None => {
                existing.insert(key.clone(), property.clone());
            }
        }
    }
}

/// Union one property into another; see [`merge_schema`].
pub fn merge_property(
    existing: &mut Property,
    incoming: &Property,
    path: &str,
    conflicts: &mut Vec<TypeConflict>,
) {
    if existing.description.is_none() {
        existing.description = incoming.description.clone();
    }

    if incoming.kind == PropertyType::Any {
        return;
    }
    if existing.kind == PropertyType::Any {
        let description = existing.description.take();
        *existing = incoming.clone();
        existing.description = description.or_else(|| incoming.description.clone());
        return;
    }
    if existing.kind != incoming.kind {
        conflicts.push(TypeConflict {
            path: path.to_string(),
            kept: existing.kind,
            ignored: incoming.kind,
        });
        return;
    }

    match existing.kind {
        PropertyType::Object => {
            if let Some(incoming_props) = &incoming.properties {
                let props = existing.properties.get_or_insert_with(PropertySchema::new);
                merge_schema(props, incoming_props, path, conflicts);
            }
        }
        PropertyType::Array => {
            if let Some(incoming_items) = &incoming.items {
                match &mut existing.items {
                    Some(items) => {
                        merge_property(items, incoming_items, &format!("{}[]", path), conflicts)
                    }
                    None => existing.items = Some(incoming_items.clone()),
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Binding, SyntaxFile};

    fn prop(key: &str, value: Expr) -> Entry {
        Entry::Property {
            key: key.to_string(),
            value,
        }
    }

    fn scope_with(bindings: Vec<Binding>) -> FileScope {
        FileScope::build(&SyntaxFile {
            path: "app.js".into(),
            language: "javascript",
            calls: vec![],
            bindings,
        })
    }

    #[test]
    fn test_primitive_types() {
        let scope = FileScope::default();
        let mut extractor = PropertyExtractor::new(&scope, "app.js", 1);
        let schema = extractor.extract(&[
            prop("plan", Expr::String("pro".into())),
            prop("trial", Expr::Bool),
            prop("value", Expr::Number),
            prop("coupon", Expr::Null),
            prop("user", Expr::Ident("currentUser".into())),
            prop("label", Expr::Interpolated),
        ]);

        let kinds: Vec<(&str, PropertyType)> =
            schema.iter().map(|(k, p)| (k.as_str(), p.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("coupon", PropertyType::Null),
                ("label", PropertyType::String),
                ("plan", PropertyType::String),
                ("trial", PropertyType::Boolean),
                ("user", PropertyType::Any),
                ("value", PropertyType::Number),
            ]
        );
        assert!(extractor.into_issues().is_empty());
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let scope = FileScope::default();
        let mut extractor = PropertyExtractor::new(&scope, "app.js", 1);
        let schema = extractor.extract(&[
            prop(
                "address",
                Expr::Object(vec![prop("city", Expr::String("SF".into()))]),
            ),
            prop(
                "items",
                Expr::Array(vec![
                    Expr::Object(vec![prop("sku", Expr::String("a".into()))]),
                    Expr::Object(vec![prop("qty", Expr::Number)]),
                ]),
            ),
            prop("ids", Expr::Array(vec![Expr::Number, Expr::Number])),
            prop("mixed", Expr::Array(vec![Expr::Number, Expr::Bool])),
            prop("empty", Expr::Array(vec![])),
        ]);

        let address = schema["address"].properties.as_ref().unwrap();
        assert_eq!(address["city"].kind, PropertyType::String);

        let items = schema["items"].items.as_ref().unwrap();
        assert_eq!(items.kind, PropertyType::Object);
        let item_props = items.properties.as_ref().unwrap();
        assert!(item_props.contains_key("sku") && item_props.contains_key("qty"));

        assert_eq!(schema["ids"].items.as_ref().unwrap().kind, PropertyType::Number);
        assert_eq!(schema["mixed"].items.as_ref().unwrap().kind, PropertyType::Any);
        assert_eq!(schema["empty"].items.as_ref().unwrap().kind, PropertyType::Any);
    }

    #[test]
    fn test_spread_records_issue() {
        let scope = FileScope::default();
        let mut extractor = PropertyExtractor::new(&scope, "app.js", 7);
        let schema = extractor.extract(&[
            Entry::Spread(Expr::Ident("base".into())),
            prop("plan", Expr::String("pro".into())),
        ]);
        assert_eq!(schema.len(), 1);

        let issues = extractor.into_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::UnresolvedSpread);
        assert_eq!(issues[0].line, Some(7));
        assert!(issues[0].message.contains("`base`"));
    }

    #[test]
    fn test_constants_in_values_and_computed_keys() {
        let scope = scope_with(vec![
            Binding {
                name: "PLAN".into(),
                value: Expr::String("pro".into()),
                line: 1,
            },
            Binding {
                name: "KEYS".into(),
                value: Expr::Object(vec![prop("SOURCE", Expr::String("source".into()))]),
                line: 2,
            },
        ]);
        let mut extractor = PropertyExtractor::new(&scope, "app.js", 3);
        let schema = extractor.extract(&[
            prop("plan", Expr::Ident("PLAN".into())),
            Entry::Computed {
                key: Expr::member(Expr::Ident("KEYS".into()), "SOURCE"),
                value: Expr::Bool,
            },
            Entry::Computed {
                key: Expr::Ident("dynamicKey".into()),
                value: Expr::Number,
            },
        ]);
        assert_eq!(schema["plan"].kind, PropertyType::String);
        assert_eq!(schema["source"].kind, PropertyType::Boolean);
        assert_eq!(schema.len(), 2);
    }

    #[test]
    fn test_payload_bound_to_name() {
        let scope = scope_with(vec![Binding {
            name: "payload".into(),
            value: Expr::Object(vec![prop("total", Expr::Number)]),
            line: 1,
        }]);
        let mut extractor = PropertyExtractor::new(&scope, "app.js", 2);
        let schema = extractor.extract_payload(&Expr::Ident("payload".into()));
        assert_eq!(schema["total"].kind, PropertyType::Number);
        assert!(extractor
            .extract_payload(&Expr::Ident("unknown".into()))
            .is_empty());
    }

    #[test]
    fn test_merge_first_seen_wins() {
        let mut existing = PropertySchema::new();
        existing.insert("plan".into(), Property::of(PropertyType::String));
        existing.insert("user".into(), Property::any());

        let mut incoming = PropertySchema::new();
        incoming.insert("plan".into(), Property::of(PropertyType::Number));
        incoming.insert("user".into(), Property::of(PropertyType::Object));
        incoming.insert("seats".into(), Property::of(PropertyType::Number));

        let mut conflicts = Vec::new();
        merge_schema(&mut existing, &incoming, "", &mut conflicts);

        assert_eq!(existing["plan"].kind, PropertyType::String);
        assert_eq!(existing["user"].kind, PropertyType::Object);
        assert_eq!(existing["seats"].kind, PropertyType::Number);
        assert_eq!(
            conflicts,
            vec![TypeConflict {
                path: "plan".into(),
                kept: PropertyType::String,
                ignored: PropertyType::Number,
            }]
        );
    }

    #[test]
    fn test_merge_nested_conflict_path() {
        let mut inner = PropertySchema::new();
        inner.insert("zip".into(), Property::of(PropertyType::String));
        let mut existing = PropertySchema::new();
        existing.insert("address".into(), Property::object(inner));

        let mut other = PropertySchema::new();
        other.insert("zip".into(), Property::of(PropertyType::Number));
        let mut incoming = PropertySchema::new();
        incoming.insert("address".into(), Property::object(other));

        let mut conflicts = Vec::new();
        merge_schema(&mut existing, &incoming, "", &mut conflicts);
        assert_eq!(conflicts[0].path, "address.zip");
    }
}
