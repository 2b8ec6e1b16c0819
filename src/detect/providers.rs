//! Provider dispatch table.
//!
//! Each supported analytics SDK is a [`Provider`] with a fixed call
//! convention per language family. Matching walks a static rule list; adding
//! a provider means adding a variant and a rule, never another branch in the
//! matcher.

use phf::phf_map;
use serde::{Deserialize, Serialize};

use crate::analysis::{CallExpr, Entry, Expr};

/// An analytics destination.
///
/// Declared in alphabetical order so derived ordering matches the emitted
/// names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Amplitude,
    /// A user-declared wrapper function.
    Custom,
    Datadog,
    GoogleAnalytics,
    Gtm,
    Heap,
    Mixpanel,
    Mparticle,
    Pendo,
    Posthog,
    Rudderstack,
    Segment,
    Snowplow,
}

/// Accepted spellings for provider names on the command line and in config.
static PROVIDER_NAMES: phf::Map<&'static str, Provider> = phf_map! {
    "amplitude" => Provider::Amplitude,
    "custom" => Provider::Custom,
    "datadog" => Provider::Datadog,
    "datadog_rum" => Provider::Datadog,
    "googleanalytics" => Provider::GoogleAnalytics,
    "google_analytics" => Provider::GoogleAnalytics,
    "ga" => Provider::GoogleAnalytics,
    "gtag" => Provider::GoogleAnalytics,
    "gtm" => Provider::Gtm,
    "googletagmanager" => Provider::Gtm,
    "heap" => Provider::Heap,
    "mixpanel" => Provider::Mixpanel,
    "mparticle" => Provider::Mparticle,
    "pendo" => Provider::Pendo,
    "posthog" => Provider::Posthog,
    "rudderstack" => Provider::Rudderstack,
    "rudderanalytics" => Provider::Rudderstack,
    "segment" => Provider::Segment,
    "snowplow" => Provider::Snowplow,
};

impl Provider {
    /// Every built-in provider, excluding [`Provider::Custom`].
    pub const BUILTIN: &'static [Provider] = &[
        Provider::Amplitude,
        Provider::Datadog,
        Provider::GoogleAnalytics,
        Provider::Gtm,
        Provider::Heap,
        Provider::Mixpanel,
        Provider::Mparticle,
        Provider::Pendo,
        Provider::Posthog,
        Provider::Rudderstack,
        Provider::Segment,
        Provider::Snowplow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Amplitude => "amplitude",
            Provider::Custom => "custom",
            Provider::Datadog => "datadog",
            Provider::GoogleAnalytics => "googleanalytics",
            Provider::Gtm => "gtm",
            Provider::Heap => "heap",
            Provider::Mixpanel => "mixpanel",
            Provider::Mparticle => "mparticle",
            Provider::Pendo => "pendo",
            Provider::Posthog => "posthog",
            Provider::Rudderstack => "rudderstack",
            Provider::Segment => "segment",
            Provider::Snowplow => "snowplow",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('-', "_");
        PROVIDER_NAMES
            .get(key.as_str())
            .copied()
            .ok_or_else(|| format!("unknown provider: {}", s))
    }
}

/// Language family a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    EcmaScript,
    Python,
    Go,
    Ruby,
}

impl Dialect {
    pub fn for_language(language_id: &str) -> Option<Self> {
        match language_id {
            "javascript" | "typescript" => Some(Dialect::EcmaScript),
            "python" => Some(Dialect::Python),
            "go" => Some(Dialect::Go),
            "ruby" => Some(Dialect::Ruby),
            _ => None,
        }
    }
}

/// Where an argument lives: a keyword (Python) takes precedence over the
/// positional index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSlot {
    pub index: usize,
    pub keyword: Option<&'static str>,
}

impl ArgSlot {
    const fn at(index: usize) -> Self {
        Self {
            index,
            keyword: None,
        }
    }

    const fn named(index: usize, keyword: &'static str) -> Self {
        Self {
            index,
            keyword: Some(keyword),
        }
    }

    pub fn get<'a>(&self, call: &'a CallExpr) -> Option<&'a Expr> {
        self.keyword
            .and_then(|k| call.keyword(k))
            .or_else(|| call.positional(self.index))
    }
}

/// Shape of the callee a rule responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    /// A bare function: `gtag(...)`.
    Function(&'static str),
    /// `receiver.method(...)`, where the receiver's last segment is one of
    /// `receivers`. An empty list accepts any receiver.
    Method {
        receivers: &'static [&'static str],
        method: &'static str,
    },
}

impl Callee {
    fn matches(&self, callee: &Expr) -> bool {
        match (self, callee) {
            (Callee::Function(name), Expr::Ident(ident)) => ident == name,
            (Callee::Method { receivers, method }, Expr::Member { object, property }) => {
                property == method
                    && (receivers.is_empty()
                        || object
                            .last_segment()
                            .map(|r| receivers.contains(&r))
                            .unwrap_or(false))
            }
            _ => false,
        }
    }
}

/// How a provider passes event name and properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Name and properties as arguments: `track(name, props)`.
    Positional {
        event: ArgSlot,
        properties: Option<ArgSlot>,
    },
    /// A leading tag argument: `gtag('event', name, props)`.
    Tagged { tag: &'static str },
    /// One object carrying the name under `key`: `push({event: name, ...})`.
    KeyedObject { key: &'static str },
    /// A builder call carrying the name under `key`:
    /// `track(buildStructEvent({action: name, ...}))` or
    /// `track(StructuredEvent(action=name, ...))`.
    Wrapped {
        builders: &'static [&'static str],
        key: &'static str,
    },
    /// An event object with separate name and properties keywords:
    /// `track(BaseEvent(event_type=name, event_properties={...}))`.
    EventObject {
        builder: &'static str,
        event_key: &'static str,
        properties_key: &'static str,
    },
    /// Keyword arguments with the name under `key` and the rest as
    /// properties: `track_struct_event(category: c, action: name)`.
    Keywords { key: &'static str },
    /// Name and properties as keywords, or as members of a single options
    /// hash: `track(event: name, properties: props)` or
    /// `capture({event: name, properties: props})`.
    Options {
        event: &'static str,
        properties: &'static str,
    },
}

/// Unresolved event data pulled out of a call by its convention.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCall<'a> {
    /// The event name expression, before constant resolution.
    pub event: &'a Expr,
    pub payload: Payload<'a>,
    /// A key removed from the final property set.
    pub strip: Option<&'static str>,
}

/// The properties part of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<'a> {
    Absent,
    Expr(&'a Expr),
    /// Keyword arguments gathered into an object.
    Entries(Vec<Entry>),
}

impl Convention {
    /// Pull event data out of `call`, or `None` when the call does not have
    /// this convention's shape.
    pub fn extract<'a>(&self, call: &'a CallExpr) -> Option<RawCall<'a>> {
        match *self {
            Convention::Positional { event, properties } => Some(RawCall {
                event: event.get(call)?,
                payload: properties
                    .and_then(|slot| slot.get(call))
                    .map(Payload::Expr)
                    .unwrap_or(Payload::Absent),
                strip: None,
            }),
            Convention::Tagged { tag } => {
                match call.positional(0)? {
                    Expr::String(s) if s == tag => {}
                    _ => return None,
                }
                Some(RawCall {
                    event: call.positional(1)?,
                    payload: call
                        .positional(2)
                        .map(Payload::Expr)
                        .unwrap_or(Payload::Absent),
                    strip: None,
                })
            }
            Convention::KeyedObject { key } => {
                let object = call.positional(0)?;
                let entries = object.as_object()?;
                Some(RawCall {
                    event: Entry::value_of(entries, key)?,
                    payload: Payload::Expr(object),
                    strip: Some(key),
                })
            }
            Convention::Wrapped { builders, key } => {
                let inner = call.positional(0)?.as_call()?;
                if !builder_matches(&inner.callee, builders) {
                    return None;
                }
                // JS builders take an object; Python builders take keywords.
                match inner.positional(0) {
                    Some(object) if object.as_object().is_some() => Some(RawCall {
                        event: Entry::value_of(object.as_object()?, key)?,
                        payload: Payload::Expr(object),
                        strip: Some(key),
                    }),
                    _ => Some(RawCall {
                        event: inner.keyword(key)?,
                        payload: Payload::Entries(inner.keywords_except(&[key])),
                        strip: Some(key),
                    }),
                }
            }
            Convention::EventObject {
                builder,
                event_key,
                properties_key,
            } => {
                let inner = call.positional(0)?.as_call()?;
                if !builder_matches(&inner.callee, &[builder]) {
                    return None;
                }
                Some(RawCall {
                    event: inner.keyword(event_key)?,
                    payload: inner
                        .keyword(properties_key)
                        .map(Payload::Expr)
                        .unwrap_or(Payload::Absent),
                    strip: None,
                })
            }
            Convention::Keywords { key } => Some(RawCall {
                event: call.keyword(key)?,
                payload: Payload::Entries(call.keywords_except(&[key])),
                strip: Some(key),
            }),
            Convention::Options { event, properties } => {
                let (name, payload) = match call.keyword(event) {
                    Some(name) => (name, call.keyword(properties)),
                    None => {
                        let options = call.positional(0)?.as_object()?;
                        (
                            Entry::value_of(options, event)?,
                            Entry::value_of(options, properties),
                        )
                    }
                };
                Some(RawCall {
                    event: name,
                    payload: payload.map(Payload::Expr).unwrap_or(Payload::Absent),
                    strip: None,
                })
            }
        }
    }
}

fn builder_matches(callee: &Expr, builders: &[&str]) -> bool {
    callee
        .last_segment()
        .map(|name| builders.contains(&name))
        .unwrap_or(false)
}

/// One row of the dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub provider: Provider,
    pub callee: Callee,
    pub convention: Convention,
    /// Human-readable form for `trackscan providers`.
    pub example: &'static str,
}

impl Rule {
    /// Extract event data if both callee and argument shape match.
    pub fn apply<'a>(&self, call: &'a CallExpr) -> Option<RawCall<'a>> {
        if !self.callee.matches(&call.callee) {
            return None;
        }
        self.convention.extract(call)
    }
}

const TRACK_NAME_PROPS: Convention = Convention::Positional {
    event: ArgSlot::at(0),
    properties: Some(ArgSlot::at(1)),
};

const STRUCT_BUILDERS: &[&str] = &["buildStructEvent"];

/// JavaScript and TypeScript rules. Structural rules come first so
/// `anything.track(buildStructEvent(...))` is not read as a plain `track`.
static ECMASCRIPT_RULES: &[Rule] = &[
    Rule {
        provider: Provider::Snowplow,
        callee: Callee::Method {
            receivers: &[],
            method: "track",
        },
        convention: Convention::Wrapped {
            builders: STRUCT_BUILDERS,
            key: "action",
        },
        example: "tracker.track(buildStructEvent({ action: name, ...props }))",
    },
    Rule {
        provider: Provider::Snowplow,
        callee: Callee::Function("trackStructEvent"),
        convention: Convention::KeyedObject { key: "action" },
        example: "trackStructEvent({ action: name, ...props })",
    },
    Rule {
        provider: Provider::GoogleAnalytics,
        callee: Callee::Function("gtag"),
        convention: Convention::Tagged { tag: "event" },
        example: "gtag('event', name, props)",
    },
    Rule {
        provider: Provider::Gtm,
        callee: Callee::Method {
            receivers: &["dataLayer"],
            method: "push",
        },
        convention: Convention::KeyedObject { key: "event" },
        example: "dataLayer.push({ event: name, ...props })",
    },
    Rule {
        provider: Provider::Segment,
        callee: Callee::Method {
            receivers: &["analytics"],
            method: "track",
        },
        convention: TRACK_NAME_PROPS,
        example: "analytics.track(name, props)",
    },
    Rule {
        provider: Provider::Mixpanel,
        callee: Callee::Method {
            receivers: &["mixpanel"],
            method: "track",
        },
        convention: TRACK_NAME_PROPS,
        example: "mixpanel.track(name, props)",
    },
    Rule {
        provider: Provider::Amplitude,
        callee: Callee::Method {
            receivers: &["amplitude"],
            method: "track",
        },
        convention: TRACK_NAME_PROPS,
        example: "amplitude.track(name, props)",
    },
    Rule {
        provider: Provider::Rudderstack,
        callee: Callee::Method {
            receivers: &["rudderanalytics"],
            method: "track",
        },
        convention: TRACK_NAME_PROPS,
        example: "rudderanalytics.track(name, props)",
    },
    Rule {
        provider: Provider::Pendo,
        callee: Callee::Method {
            receivers: &["pendo"],
            method: "track",
        },
        convention: TRACK_NAME_PROPS,
        example: "pendo.track(name, props)",
    },
    Rule {
        provider: Provider::Heap,
        callee: Callee::Method {
            receivers: &["heap"],
            method: "track",
        },
        convention: TRACK_NAME_PROPS,
        example: "heap.track(name, props)",
    },
    Rule {
        provider: Provider::Posthog,
        callee: Callee::Method {
            receivers: &["posthog"],
            method: "capture",
        },
        convention: TRACK_NAME_PROPS,
        example: "posthog.capture(name, props)",
    },
    Rule {
        provider: Provider::Datadog,
        callee: Callee::Method {
            receivers: &["datadogRum", "DD_RUM"],
            method: "addAction",
        },
        convention: TRACK_NAME_PROPS,
        example: "datadogRum.addAction(name, props)",
    },
    Rule {
        provider: Provider::Mparticle,
        callee: Callee::Method {
            receivers: &["mParticle", "mparticle"],
            method: "logEvent",
        },
        convention: Convention::Positional {
            event: ArgSlot::at(0),
            properties: Some(ArgSlot::at(2)),
        },
        example: "mParticle.logEvent(name, eventType, props)",
    },
];

/// Server-side SDKs take the user id first.
const PY_USER_NAME_PROPS: Convention = Convention::Positional {
    event: ArgSlot::named(1, "event"),
    properties: Some(ArgSlot::named(2, "properties")),
};

static PYTHON_RULES: &[Rule] = &[
    Rule {
        provider: Provider::Snowplow,
        callee: Callee::Method {
            receivers: &[],
            method: "track",
        },
        convention: Convention::Wrapped {
            builders: &["StructuredEvent"],
            key: "action",
        },
        example: "tracker.track(StructuredEvent(action=name, **props))",
    },
    Rule {
        provider: Provider::Amplitude,
        callee: Callee::Method {
            receivers: &[],
            method: "track",
        },
        convention: Convention::EventObject {
            builder: "BaseEvent",
            event_key: "event_type",
            properties_key: "event_properties",
        },
        example: "client.track(BaseEvent(event_type=name, event_properties=props))",
    },
    Rule {
        provider: Provider::Segment,
        callee: Callee::Method {
            receivers: &["analytics"],
            method: "track",
        },
        convention: PY_USER_NAME_PROPS,
        example: "analytics.track(user_id, name, props)",
    },
    Rule {
        provider: Provider::Rudderstack,
        callee: Callee::Method {
            receivers: &["rudder_analytics"],
            method: "track",
        },
        convention: PY_USER_NAME_PROPS,
        example: "rudder_analytics.track(user_id, name, props)",
    },
    Rule {
        provider: Provider::Mixpanel,
        callee: Callee::Method {
            receivers: &["mixpanel", "mp"],
            method: "track",
        },
        convention: PY_USER_NAME_PROPS,
        example: "mp.track(distinct_id, name, props)",
    },
    Rule {
        provider: Provider::Posthog,
        callee: Callee::Method {
            receivers: &["posthog"],
            method: "capture",
        },
        convention: PY_USER_NAME_PROPS,
        example: "posthog.capture(distinct_id, event=name, properties=props)",
    },
];

/// Go SDKs take struct literals, lowered to keyword calls on the type.
static GO_RULES: &[Rule] = &[
    Rule {
        provider: Provider::Snowplow,
        callee: Callee::Method {
            receivers: &[],
            method: "TrackStructEvent",
        },
        convention: Convention::Wrapped {
            builders: &["StructuredEvent"],
            key: "Action",
        },
        example: "tracker.TrackStructEvent(sp.StructuredEvent{Action: sp.NewString(name), ...})",
    },
    Rule {
        provider: Provider::Segment,
        callee: Callee::Method {
            receivers: &[],
            method: "Enqueue",
        },
        convention: Convention::EventObject {
            builder: "Track",
            event_key: "Event",
            properties_key: "Properties",
        },
        example: "client.Enqueue(analytics.Track{Event: name, Properties: props})",
    },
    Rule {
        provider: Provider::Posthog,
        callee: Callee::Method {
            receivers: &[],
            method: "Enqueue",
        },
        convention: Convention::EventObject {
            builder: "Capture",
            event_key: "Event",
            properties_key: "Properties",
        },
        example: "client.Enqueue(posthog.Capture{Event: name, Properties: props})",
    },
    Rule {
        provider: Provider::Amplitude,
        callee: Callee::Method {
            receivers: &[],
            method: "Track",
        },
        convention: Convention::EventObject {
            builder: "Event",
            event_key: "EventType",
            properties_key: "EventProperties",
        },
        example: "client.Track(amplitude.Event{EventType: name, EventProperties: props})",
    },
    Rule {
        provider: Provider::Mixpanel,
        callee: Callee::Method {
            receivers: &[],
            method: "NewEvent",
        },
        convention: Convention::Positional {
            event: ArgSlot::at(0),
            properties: Some(ArgSlot::at(2)),
        },
        example: "mp.NewEvent(name, distinctID, props)",
    },
];

const RB_EVENT_OPTIONS: Convention = Convention::Options {
    event: "event",
    properties: "properties",
};

static RUBY_RULES: &[Rule] = &[
    Rule {
        provider: Provider::Snowplow,
        callee: Callee::Method {
            receivers: &[],
            method: "track_struct_event",
        },
        convention: Convention::Keywords { key: "action" },
        example: "tracker.track_struct_event(category: c, action: name, **props)",
    },
    Rule {
        provider: Provider::Segment,
        callee: Callee::Method {
            receivers: &["Analytics", "analytics"],
            method: "track",
        },
        convention: RB_EVENT_OPTIONS,
        example: "Analytics.track(user_id: id, event: name, properties: props)",
    },
    Rule {
        provider: Provider::Rudderstack,
        callee: Callee::Method {
            receivers: &["Rudder", "RudderAnalytics", "rudder_analytics"],
            method: "track",
        },
        convention: RB_EVENT_OPTIONS,
        example: "rudder_analytics.track(user_id: id, event: name, properties: props)",
    },
    Rule {
        provider: Provider::Posthog,
        callee: Callee::Method {
            receivers: &["posthog", "PostHog"],
            method: "capture",
        },
        convention: RB_EVENT_OPTIONS,
        example: "posthog.capture({distinct_id: id, event: name, properties: props})",
    },
    Rule {
        provider: Provider::Mixpanel,
        callee: Callee::Method {
            receivers: &["tracker", "mixpanel"],
            method: "track",
        },
        convention: Convention::Positional {
            event: ArgSlot::at(1),
            properties: Some(ArgSlot::at(2)),
        },
        example: "tracker.track(distinct_id, name, props)",
    },
];

/// The dispatch table for a dialect.
pub fn rules(dialect: Dialect) -> &'static [Rule] {
    match dialect {
        Dialect::EcmaScript => ECMASCRIPT_RULES,
        Dialect::Python => PYTHON_RULES,
        Dialect::Go => GO_RULES,
        Dialect::Ruby => RUBY_RULES,
    }
}

/// First rule for an enabled provider whose shape matches `call`.
pub fn dispatch<'a>(
    dialect: Dialect,
    call: &'a CallExpr,
    enabled: &[Provider],
) -> Option<(Provider, RawCall<'a>)> {
    rules(dialect)
        .iter()
        .filter(|rule| enabled.contains(&rule.provider))
        .find_map(|rule| rule.apply(call).map(|raw| (rule.provider, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Arg;

    fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    fn string(s: &str) -> Expr {
        Expr::String(s.to_string())
    }

    fn method(receiver: Expr, name: &str, args: Vec<Arg>) -> CallExpr {
        CallExpr {
            callee: Expr::member(receiver, name),
            args,
        }
    }

    fn entries(pairs: &[(&str, Expr)]) -> Expr {
        Expr::Object(
            pairs
                .iter()
                .map(|(k, v)| Entry::Property {
                    key: k.to_string(),
                    value: v.clone(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_provider_names() {
        assert_eq!("Segment".parse::<Provider>().unwrap(), Provider::Segment);
        assert_eq!(
            "google-analytics".parse::<Provider>().unwrap(),
            Provider::GoogleAnalytics
        );
        assert!("omniture".parse::<Provider>().is_err());
        assert_eq!(Provider::GoogleAnalytics.to_string(), "googleanalytics");
    }

    #[test]
    fn test_gtag_requires_event_tag() {
        let call = CallExpr {
            callee: ident("gtag"),
            args: vec![
                Arg::positional(string("config")),
                Arg::positional(string("G-123")),
            ],
        };
        assert!(dispatch(Dialect::EcmaScript, &call, Provider::BUILTIN).is_none());

        let call = CallExpr {
            callee: ident("gtag"),
            args: vec![
                Arg::positional(string("event")),
                Arg::positional(string("purchase")),
            ],
        };
        let (provider, raw) = dispatch(Dialect::EcmaScript, &call, Provider::BUILTIN).unwrap();
        assert_eq!(provider, Provider::GoogleAnalytics);
        assert_eq!(raw.event, &string("purchase"));
        assert_eq!(raw.payload, Payload::Absent);
    }

    #[test]
    fn test_receiver_matches_last_segment() {
        let call = method(
            Expr::member(ident("window"), "dataLayer"),
            "push",
            vec![Arg::positional(entries(&[
                ("event", string("video_play")),
                ("videoId", string("abc")),
            ]))],
        );
        let (provider, raw) = dispatch(Dialect::EcmaScript, &call, Provider::BUILTIN).unwrap();
        assert_eq!(provider, Provider::Gtm);
        assert_eq!(raw.strip, Some("event"));
    }

    #[test]
    fn test_struct_event_wins_over_plain_track() {
        let built = Expr::Call(Box::new(CallExpr {
            callee: ident("buildStructEvent"),
            args: vec![Arg::positional(entries(&[("action", string("item_view"))]))],
        }));
        let call = method(ident("analytics"), "track", vec![Arg::positional(built)]);
        let (provider, raw) = dispatch(Dialect::EcmaScript, &call, Provider::BUILTIN).unwrap();
        assert_eq!(provider, Provider::Snowplow);
        assert_eq!(raw.event, &string("item_view"));
    }

    #[test]
    fn test_disabled_provider_is_skipped() {
        let call = method(
            ident("mixpanel"),
            "track",
            vec![Arg::positional(string("order_completed"))],
        );
        assert!(dispatch(Dialect::EcmaScript, &call, &[Provider::Segment]).is_none());
        assert!(dispatch(Dialect::EcmaScript, &call, &[Provider::Mixpanel]).is_some());
    }

    #[test]
    fn test_python_keyword_slots() {
        let call = method(
            ident("posthog"),
            "capture",
            vec![
                Arg::positional(ident("distinct_id")),
                Arg::keyword("event", string("user_cancelled")),
                Arg::keyword("properties", entries(&[("plan", string("pro"))])),
            ],
        );
        let (provider, raw) = dispatch(Dialect::Python, &call, Provider::BUILTIN).unwrap();
        assert_eq!(provider, Provider::Posthog);
        assert_eq!(raw.event, &string("user_cancelled"));
        assert!(matches!(raw.payload, Payload::Expr(Expr::Object(_))));
    }

    #[test]
    fn test_python_structured_event_keywords() {
        let built = Expr::Call(Box::new(CallExpr {
            callee: ident("StructuredEvent"),
            args: vec![
                Arg::keyword("action", string("add-to-basket")),
                Arg::keyword("label", string("web-shop")),
                Arg::keyword("value", ident("value")),
            ],
        }));
        let call = method(ident("tracker"), "track", vec![Arg::positional(built)]);
        let (provider, raw) = dispatch(Dialect::Python, &call, Provider::BUILTIN).unwrap();
        assert_eq!(provider, Provider::Snowplow);
        match raw.payload {
            Payload::Entries(entries) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_go_struct_literals_pick_provider_by_type() {
        let track = |ty: &str| {
            Expr::Call(Box::new(CallExpr {
                callee: Expr::member(ident("analytics"), ty),
                args: vec![
                    Arg::keyword("UserId", ident("userId")),
                    Arg::keyword("Event", string("Signed Up")),
                    Arg::keyword("Properties", entries(&[("plan", string("pro"))])),
                ],
            }))
        };
        let call = method(ident("client"), "Enqueue", vec![Arg::positional(track("Track"))]);
        let (provider, raw) = dispatch(Dialect::Go, &call, Provider::BUILTIN).unwrap();
        assert_eq!(provider, Provider::Segment);
        assert_eq!(raw.event, &string("Signed Up"));

        let call = method(ident("client"), "Enqueue", vec![Arg::positional(track("Capture"))]);
        let (provider, _) = dispatch(Dialect::Go, &call, Provider::BUILTIN).unwrap();
        assert_eq!(provider, Provider::Posthog);

        let call = method(ident("client"), "Enqueue", vec![Arg::positional(track("Identify"))]);
        assert!(dispatch(Dialect::Go, &call, Provider::BUILTIN).is_none());
    }

    #[test]
    fn test_ruby_keywords_or_options_hash() {
        let call = method(
            ident("Analytics"),
            "track",
            vec![
                Arg::keyword("user_id", ident("id")),
                Arg::keyword("event", string("Order Placed")),
                Arg::keyword("properties", entries(&[("total", Expr::Number)])),
            ],
        );
        let (provider, raw) = dispatch(Dialect::Ruby, &call, Provider::BUILTIN).unwrap();
        assert_eq!(provider, Provider::Segment);
        assert_eq!(raw.event, &string("Order Placed"));
        assert!(matches!(raw.payload, Payload::Expr(Expr::Object(_))));

        let call = method(
            ident("posthog"),
            "capture",
            vec![Arg::positional(entries(&[
                ("distinct_id", ident("id")),
                ("event", string("movie_played")),
            ]))],
        );
        let (provider, raw) = dispatch(Dialect::Ruby, &call, Provider::BUILTIN).unwrap();
        assert_eq!(provider, Provider::Posthog);
        assert_eq!(raw.event, &string("movie_played"));
        assert_eq!(raw.payload, Payload::Absent);
    }

    #[test]
    fn test_ruby_struct_event_keywords() {
        let call = method(
            ident("tracker"),
            "track_struct_event",
            vec![
                Arg::keyword("category", string("shop")),
                Arg::keyword("action", string("add-to-basket")),
                Arg::keyword("value", Expr::Number),
            ],
        );
        let (provider, raw) = dispatch(Dialect::Ruby, &call, Provider::BUILTIN).unwrap();
        assert_eq!(provider, Provider::Snowplow);
        assert_eq!(raw.event, &string("add-to-basket"));
        match raw.payload {
            Payload::Entries(entries) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected payload {:?}", other),
        }
    }
}
