//! Event aggregation across files.

use std::collections::{BTreeMap, HashSet};

use crate::schema::{Event, Implementation};

use super::matcher::Detection;
use super::providers::Provider;
use super::properties::merge_schema;
use super::types::{Issue, IssueKind};

type ImplementationKey = (String, String, usize, Provider, String);

/// Single-writer accumulator for detections.
///
/// Feed it files in a fixed order: "first seen" for property types depends
/// on it.
#[derive(Debug, Default)]
pub struct EventAggregator {
    events: BTreeMap<String, Event>,
    seen: HashSet<ImplementationKey>,
    issues: Vec<Issue>,
}

impl EventAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, detection: Detection) {
        let Detection {
            event: name,
            implementation,
            properties,
        } = detection;

        let event = self.events.entry(name.clone()).or_default();

        let key = owned_key(&name, &implementation);
        if self.seen.insert(key) {
            if event.description.is_none() {
                event.description = implementation.description.clone();
            }
            event.implementations.push(implementation.clone());
        }

        let mut conflicts = Vec::new();
        merge_schema(&mut event.properties, &properties, "", &mut conflicts);
        for conflict in conflicts {
            self.issues.push(
                Issue::new(
                    IssueKind::AggregationConflict,
                    format!(
                        "property `{}` of event `{}`: kept {}, ignored {}",
                        conflict.path, name, conflict.kept, conflict.ignored
                    ),
                )
                .in_file(implementation.path.as_str())
                .at_line(implementation.line),
            );
        }
    }

    pub fn extend(&mut self, detections: impl IntoIterator<Item = Detection>) {
        for detection in detections {
            self.add(detection);
        }
    }

    /// The event map with implementations sorted, plus conflict issues.
    pub fn finish(self) -> (BTreeMap<String, Event>, Vec<Issue>) {
        let mut events = self.events;
        for event in events.values_mut() {
            event.implementations.sort();
        }
        (events, self.issues)
    }
}

/// Call sites are deduplicated per event: one line may fire several events.
fn owned_key(event: &str, implementation: &Implementation) -> ImplementationKey {
    let (path, line, destination, function) = implementation.key();
    (
        event.to_string(),
        path.to_string(),
        line,
        destination,
        function.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Property, PropertySchema, PropertyType};

    fn detection(event: &str, path: &str, line: usize, props: &[(&str, PropertyType)]) -> Detection {
        Detection {
            event: event.to_string(),
            implementation: Implementation {
                path: path.to_string(),
                line,
                function: "global".to_string(),
                destination: Provider::Segment,
                description: None,
            },
            properties: props
                .iter()
                .map(|(k, t)| (k.to_string(), Property::of(*t)))
                .collect::<PropertySchema>(),
        }
    }

    #[test]
    fn test_union_of_properties() {
        let mut aggregator = EventAggregator::new();
        aggregator.add(detection("checkout", "a.js", 1, &[("a", PropertyType::String)]));
        aggregator.add(detection("checkout", "b.js", 4, &[("b", PropertyType::Number)]));

        let (events, issues) = aggregator.finish();
        let event = &events["checkout"];
        assert_eq!(event.implementations.len(), 2);
        assert_eq!(
            event.properties.keys().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_identical_implementations_dedup() {
        let mut aggregator = EventAggregator::new();
        aggregator.add(detection("signup", "a.js", 3, &[]));
        aggregator.add(detection("signup", "a.js", 3, &[]));

        let mut other_destination = detection("signup", "a.js", 3, &[]);
        other_destination.implementation.destination = Provider::Mixpanel;
        aggregator.add(other_destination);

        let (events, _) = aggregator.finish();
        assert_eq!(events["signup"].implementations.len(), 2);
    }

    #[test]
    fn test_two_events_on_one_line_keep_their_call_sites() {
        let mut aggregator = EventAggregator::new();
        aggregator.add(detection("a", "flags.js", 7, &[]));
        aggregator.add(detection("b", "flags.js", 7, &[]));

        let (events, _) = aggregator.finish();
        assert_eq!(events["a"].implementations.len(), 1);
        assert_eq!(events["b"].implementations.len(), 1);
        assert_eq!(events["b"].implementations[0].line, 7);
    }

    #[test]
    fn test_type_conflict_keeps_first_and_records_issue() {
        let mut aggregator = EventAggregator::new();
        aggregator.add(detection("purchase", "a.js", 1, &[("total", PropertyType::String)]));
        aggregator.add(detection("purchase", "b.js", 9, &[("total", PropertyType::Number)]));

        let (events, issues) = aggregator.finish();
        assert_eq!(events["purchase"].properties["total"].kind, PropertyType::String);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::AggregationConflict);
        assert_eq!(issues[0].file.as_deref(), Some("b.js"));
        assert_eq!(
            issues[0].message,
            "property `total` of event `purchase`: kept string, ignored number"
        );
    }

    #[test]
    fn test_implementations_sorted_on_finish() {
        let mut aggregator = EventAggregator::new();
        aggregator.add(detection("view", "b.js", 1, &[]));
        aggregator.add(detection("view", "a.js", 20, &[]));
        aggregator.add(detection("view", "a.js", 3, &[]));

        let (events, _) = aggregator.finish();
        let order: Vec<(&str, usize)> = events["view"]
            .implementations
            .iter()
            .map(|i| (i.path.as_str(), i.line))
            .collect();
        assert_eq!(order, vec![("a.js", 3), ("a.js", 20), ("b.js", 1)]);
    }

    #[test]
    fn test_event_description_from_first_hint() {
        let mut aggregator = EventAggregator::new();
        let mut first = detection("login", "a.js", 1, &[]);
        first.implementation.description = Some("User logged in".into());
        aggregator.add(first);
        let mut second = detection("login", "b.js", 1, &[]);
        second.implementation.description = Some("Other".into());
        aggregator.add(second);

        let (events, _) = aggregator.finish();
        assert_eq!(events["login"].description.as_deref(), Some("User logged in"));
    }
}
