//! Call-site matching: turns a file's call sites into event detections.

use tracing::debug;

use crate::analysis::{CallSite, Expr, SyntaxFile};
use crate::schema::{Implementation, Property, PropertySchema};

use super::constants::FileScope;
use super::properties::PropertyExtractor;
use super::providers::{self, Dialect, Payload, Provider, RawCall};
use super::signature::CustomSignature;
use super::types::Issue;

/// One event fired at one call site.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub event: String,
    pub implementation: Implementation,
    pub properties: PropertySchema,
}

/// Everything found in one file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FileMatches {
    pub detections: Vec<Detection>,
    pub issues: Vec<Issue>,
}

/// Matches call sites against custom signatures and the provider table.
#[derive(Debug, Clone)]
pub struct Matcher {
    providers: Vec<Provider>,
    signatures: Vec<CustomSignature>,
}

impl Matcher {
    pub fn new(providers: Vec<Provider>, signatures: Vec<CustomSignature>) -> Self {
        Self {
            providers,
            signatures,
        }
    }

    /// A matcher for every built-in provider and no custom signatures.
    pub fn all_providers() -> Self {
        Self::new(Provider::BUILTIN.to_vec(), Vec::new())
    }

    /// Match every call site in `file`, in source order.
    pub fn match_file(&self, file: &SyntaxFile) -> FileMatches {
        let Some(dialect) = Dialect::for_language(file.language) else {
            return FileMatches::default();
        };

        let scope = FileScope::build(file);
        let mut matches = FileMatches::default();
        for site in &file.calls {
            let mut extractor = PropertyExtractor::new(&scope, &file.path, site.line);
            if let Some(detection) = self.match_site(dialect, site, &scope, &mut extractor, file) {
                matches.detections.push(detection);
                matches.issues.extend(extractor.into_issues());
            }
        }
        matches
    }

    fn match_site(
        &self,
        dialect: Dialect,
        site: &CallSite,
        scope: &FileScope,
        extractor: &mut PropertyExtractor<'_>,
        file: &SyntaxFile,
    ) -> Option<Detection> {
        let call = &site.call;

        // Custom signatures take precedence over built-in conventions.
        let (destination, event, properties) =
            match self.signatures.iter().find(|s| s.matches(&call.callee)) {
                Some(signature) => {
                    let event = call.positional(signature.event_arg_index);
                    let event = resolve_event(scope, event, site, file)?;
                    let mut properties = signature
                        .properties_arg_index
                        .and_then(|index| call.positional(index))
                        .map(|payload| extractor.extract_payload(payload))
                        .unwrap_or_default();

                    for extra in &signature.extra_params {
                        // Objects and names bound to object literals nest.
                        let property = match call.positional(extra.arg_index) {
                            Some(arg) => extractor.infer(arg),
                            None => Property::any(),
                        };
                        properties.insert(extra.name.clone(), property);
                    }
                    (Provider::Custom, event, properties)
                }
                None => {
                    let (provider, raw) = providers::dispatch(dialect, call, &self.providers)?;
                    let event = resolve_event(scope, Some(raw.event), site, file)?;
                    (provider, event, provider_properties(extractor, raw))
                }
            };

        Some(Detection {
            event,
            implementation: Implementation {
                path: file.path.clone(),
                line: site.line,
                function: site.function.clone(),
                destination,
                description: site.comment.clone(),
            },
            properties,
        })
    }
}

/// Event names must resolve to a non-empty string; anything else is a
/// dynamic call and silently skipped.
fn resolve_event(
    scope: &FileScope,
    event: Option<&Expr>,
    site: &CallSite,
    file: &SyntaxFile,
) -> Option<String> {
    let name = event.and_then(|e| scope.constants.resolve_str(e));
    match name {
        Some(name) if !name.is_empty() => Some(name),
        _ => {
            debug!(
                file = %file.path,
                line = site.line,
                "skipping tracking call with unresolved event name"
            );
            None
        }
    }
}

fn provider_properties(extractor: &mut PropertyExtractor<'_>, raw: RawCall<'_>) -> PropertySchema {
    let mut properties = match raw.payload {
        Payload::Absent => PropertySchema::new(),
        Payload::Expr(expr) => extractor.extract_payload(expr),
        Payload::Entries(entries) => extractor.extract(&entries),
    };
    if let Some(key) = raw.strip {
        properties.remove(key);
    }
    properties
}
